use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FailureReason;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub dati_preventivo: DatiPreventivo,
    pub anag: Anagrafica,
    pub veicolo: Veicolo,
    #[serde(default)]
    pub portante: Option<Portante>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatiPreventivo {
    pub id_ricerca: i64,
    #[serde(default)]
    pub id_preventivo: i64,
    pub id_accordo: i64,
    pub id_fascia: i64,
    #[serde(default)]
    pub provenienza_id_valore: i64,
    /// 0=Normale, 1=Classe 14, 2=Bersani, 3=Recupero attestato
    #[serde(default)]
    pub id_scelta: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anagrafica {
    pub cf: String,
    #[serde(default)]
    pub cognome: String,
    #[serde(default)]
    pub nome: String,
    #[serde(default)]
    pub sesso: String,
    #[serde(default)]
    pub nascita_giorno: String,
    #[serde(default)]
    pub nascita_mese: String,
    #[serde(default)]
    pub nascita_anno: i32,
    #[serde(default)]
    pub patente_anno: String,
    #[serde(default)]
    pub residenza_indirizzo_via: String,
    #[serde(default)]
    pub residenza_indirizzo: String,
    #[serde(default)]
    pub residenza_civico: String,
    #[serde(default)]
    pub residenza_comune: String,
    #[serde(default)]
    pub residenza_provincia: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub cellulare: Option<String>,
}

impl Anagrafica {
    pub fn birth_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(
            self.nascita_anno,
            self.nascita_mese.parse().ok()?,
            self.nascita_giorno.parse().ok()?,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Veicolo {
    #[serde(default)]
    pub targa: String,
    #[serde(default)]
    pub marca: String,
    #[serde(default)]
    pub modello: String,
    #[serde(default)]
    pub allestimento: String,
    #[serde(default)]
    pub tipo_veicolo: String,
    #[serde(default)]
    pub cilindrata: String,
    #[serde(default)]
    pub immatricolazione_giorno: String,
    #[serde(default)]
    pub immatricolazione_mese: String,
    #[serde(default)]
    pub immatricolazione_anno: i32,
    #[serde(default)]
    pub acquisto_giorno: String,
    #[serde(default)]
    pub acquisto_mese: String,
    #[serde(default)]
    pub acquisto_anno: i32,
    #[serde(default)]
    pub alimentazione: Option<String>,
    #[serde(default)]
    pub data_decorrenza: Option<String>,
}

/// Carrier vehicle/person for Bersani and attestato-recovery flows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Portante {
    #[serde(default)]
    pub cf: String,
    #[serde(default)]
    pub targa: String,
    #[serde(default)]
    pub tipo_veicolo: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UseCaseChoice {
    Standard,
    ClassCarryover,
    Bersani,
    RiskCertificateRecovery,
}

impl UseCaseChoice {
    pub fn from_id(id: Option<i64>) -> Self {
        match id.unwrap_or(0) {
            1 => UseCaseChoice::ClassCarryover,
            2 => UseCaseChoice::Bersani,
            3 => UseCaseChoice::RiskCertificateRecovery,
            _ => UseCaseChoice::Standard,
        }
    }

    /// Option label on the "Attestato di rischio" dropdown, None for the
    /// standard flow which never sees that screen.
    pub fn certificate_option(&self) -> Option<&'static str> {
        match self {
            UseCaseChoice::Standard => None,
            UseCaseChoice::Bersani => Some("Bonus Famiglia"),
            UseCaseChoice::ClassCarryover => Some("Prima assicurazione"),
            UseCaseChoice::RiskCertificateRecovery => {
                Some("Ho già un attestato su un altro veicolo")
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            UseCaseChoice::Standard => "Normale",
            UseCaseChoice::ClassCarryover => "Classe 14",
            UseCaseChoice::Bersani => "Bersani",
            UseCaseChoice::RiskCertificateRecovery => "Recupero Attestato",
        }
    }
}

/// One end-to-end quote acquisition attempt. Built when dequeued,
/// consumed entirely inside one worker, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    #[serde(default = "generate_task_id")]
    pub id: String,
    pub profile: Profile,
    #[serde(default)]
    pub proxy: Option<String>,
    #[serde(default)]
    pub refresh: bool,
}

fn generate_task_id() -> String {
    Uuid::new_v4().to_string()
}

impl Task {
    pub fn new(profile: Profile, proxy: Option<String>) -> Self {
        Self {
            id: generate_task_id(),
            profile,
            proxy,
            refresh: false,
        }
    }

    pub fn use_case(&self) -> UseCaseChoice {
        UseCaseChoice::from_id(self.profile.dati_preventivo.id_scelta)
    }
}

/// reCAPTCHA parameters recovered at runtime by the capability probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeDescriptor {
    pub site_key: String,
    pub page_url: Option<String>,
    pub callback_ref: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteRecord {
    #[serde(rename = "IdAccordo")]
    pub id_accordo: i64,
    #[serde(rename = "IdFascia")]
    pub id_fascia: i64,
    #[serde(rename = "Sito")]
    pub sito: String,
    #[serde(rename = "Compagnia")]
    pub compagnia: String,
    #[serde(rename = "Prodotto")]
    pub prodotto: String,
    #[serde(rename = "Guida")]
    pub guida: String,
    #[serde(rename = "Prezzo_Totale")]
    pub prezzo_totale: String,
    #[serde(rename = "Prezzo_RCA")]
    pub prezzo: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timings {
    #[serde(rename = "DataInizio")]
    pub data_inizio: String,
    #[serde(rename = "DataFine")]
    pub data_fine: String,
    #[serde(rename = "ElapsedMs")]
    pub elapsed_ms: u64,
}

impl Timings {
    pub fn since(start: chrono::DateTime<chrono::Utc>) -> Self {
        let end = chrono::Utc::now();
        Self {
            data_inizio: start.format("%d/%m/%Y %H:%M:%S").to_string(),
            data_fine: end.format("%d/%m/%Y %H:%M:%S").to_string(),
            elapsed_ms: (end - start).num_milliseconds().max(0) as u64,
        }
    }
}

/// Exactly one Outcome terminates a Task.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum Outcome {
    Success {
        quotes: Vec<QuoteRecord>,
        timings: Timings,
    },
    Failure {
        reason: FailureReason,
        message: String,
        timings: Timings,
    },
}

impl Outcome {
    /// Flow completed but zero records were recovered. The session itself
    /// succeeded, the reporter turns this into the distinct non-fatal
    /// "empty data" failure on the wire.
    pub fn is_empty_success(&self) -> bool {
        matches!(self, Outcome::Success { quotes, .. } if quotes.is_empty())
    }

    pub fn timings(&self) -> &Timings {
        match self {
            Outcome::Success { timings, .. } => timings,
            Outcome::Failure { timings, .. } => timings,
        }
    }
}

/// Age at time of quoting, counted the civil way: the birthday this year
/// may not have happened yet.
pub fn compute_age(birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    age
}

pub fn needs_expert_guidance(age: i32) -> bool {
    age > 26
}

pub fn guidance_label(age: i32) -> &'static str {
    if needs_expert_guidance(age) {
        "Esperta"
    } else {
        "Libera"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_use_case_from_id() {
        assert_eq!(UseCaseChoice::from_id(Some(0)), UseCaseChoice::Standard);
        assert_eq!(UseCaseChoice::from_id(None), UseCaseChoice::Standard);
        assert_eq!(UseCaseChoice::from_id(Some(1)), UseCaseChoice::ClassCarryover);
        assert_eq!(UseCaseChoice::from_id(Some(2)), UseCaseChoice::Bersani);
        assert_eq!(
            UseCaseChoice::from_id(Some(3)),
            UseCaseChoice::RiskCertificateRecovery
        );
    }

    #[test]
    fn test_age_counts_unpassed_birthday() {
        let birth = NaiveDate::from_ymd_opt(1998, 12, 31).unwrap();
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert_eq!(compute_age(birth, today), 26);

        let birth = NaiveDate::from_ymd_opt(1998, 1, 1).unwrap();
        assert_eq!(compute_age(birth, today), 27);
    }

    #[test]
    fn test_guidance_threshold() {
        assert!(needs_expert_guidance(27));
        assert!(!needs_expert_guidance(26));
        assert!(!needs_expert_guidance(25));
        assert_eq!(guidance_label(27), "Esperta");
        assert_eq!(guidance_label(25), "Libera");
    }
}
