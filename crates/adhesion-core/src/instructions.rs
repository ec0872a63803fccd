//! Provider-specific payment instructions.
//!
//! Instructions are a pure function of the payment method, the amount, the
//! cotisation reference and [`DuesConfig`]. Regenerating them is always safe.

use serde::{Deserialize, Serialize};

use crate::{
  cotisation::PaymentMethod,
  currency::{CANONICAL, Currency},
};

/// Where dues are paid to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DuesConfig {
  /// Merchant or wallet number credited by mobile-money transfers.
  pub recipient:      String,
  /// Account reference for bank transfers.
  pub bank_reference: String,
  pub orange_code:    String,
  pub moov_code:      String,
  pub wave_code:      String,
}

impl Default for DuesConfig {
  fn default() -> Self {
    Self {
      recipient:      "70000000".to_owned(),
      bank_reference: "ML000 00000 000000000000 00".to_owned(),
      orange_code:    "#144#".to_owned(),
      moov_code:      "#155#".to_owned(),
      wave_code:      "*939#".to_owned(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInstructions {
  pub provider:    String,
  /// USSD short code for mobile money, account reference for bank transfers.
  pub access_code: String,
  pub recipient:   String,
  pub amount:      i64,
  pub currency:    Currency,
  /// Memo the member should attach so the payment can be matched.
  pub reference:   String,
  pub steps:       Vec<String>,
}

/// Build the instructions for paying `amount` canonical units by `method`.
pub fn payment_instructions(
  method: PaymentMethod,
  amount: i64,
  reference: &str,
  config: &DuesConfig,
) -> PaymentInstructions {
  let provider = method.display_name();
  let currency = CANONICAL;

  let (access_code, recipient, steps) = match method {
    PaymentMethod::OrangeMoney
    | PaymentMethod::MoovMoney
    | PaymentMethod::Wave => {
      let code = match method {
        PaymentMethod::OrangeMoney => &config.orange_code,
        PaymentMethod::MoovMoney => &config.moov_code,
        _ => &config.wave_code,
      };
      let steps = vec![
        format!("Composez {code} sur votre téléphone {provider}."),
        "Choisissez « Paiement marchand ».".to_owned(),
        format!("Saisissez le numéro du bénéficiaire : {}.", config.recipient),
        format!("Saisissez le montant : {amount} {currency}."),
        format!("Indiquez la référence {reference} puis validez avec votre code secret."),
        "Conservez l'identifiant de transaction reçu par SMS.".to_owned(),
      ];
      (code.clone(), config.recipient.clone(), steps)
    }
    PaymentMethod::BankTransfer => {
      let steps = vec![
        format!("Effectuez un virement de {amount} {currency}."),
        format!("Compte bénéficiaire : {}.", config.bank_reference),
        format!("Libellé du virement : {reference}."),
        "Conservez la référence de l'ordre de virement.".to_owned(),
      ];
      (config.bank_reference.clone(), config.bank_reference.clone(), steps)
    }
  };

  PaymentInstructions {
    provider: provider.to_owned(),
    access_code,
    recipient,
    amount,
    currency,
    reference: reference.to_owned(),
    steps,
  }
}
