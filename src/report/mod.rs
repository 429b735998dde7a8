use crate::models::{Outcome, Task};
use serde_json::{json, Value};

const PROVENANCE_ID: i64 = 999969;

/// Pushes finished-task envelopes to the collector endpoint. Reporting is
/// fire-and-forget: a collector outage must never fail the task itself.
pub struct ResultReporter {
    http: reqwest::Client,
    collector_url: Option<String>,
}

impl ResultReporter {
    pub fn new(collector_url: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            collector_url,
        }
    }

    pub async fn report(&self, task: &Task, outcome: &Outcome) {
        let payload = build_payload(task, outcome);

        let Some(ref url) = self.collector_url else {
            tracing::info!(
                "TID: {} | 📤 No collector configured | outcome: {}",
                task.id,
                payload["message"].as_str().unwrap_or("?")
            );
            return;
        };

        match self.http.post(url).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!("TID: {} | 📤 Result delivered to collector", task.id);
            }
            Ok(resp) => {
                tracing::warn!(
                    "TID: {} | 📤 Collector answered {}",
                    task.id,
                    resp.status()
                );
            }
            Err(e) => {
                tracing::warn!("TID: {} | 📤 Collector unreachable: {}", task.id, e);
            }
        }
    }
}

/// The collector's wire envelope. A completed run with zero quotes travels
/// as the distinct "empty data" failure so downstream can tell it from a
/// session failure.
pub fn build_payload(task: &Task, outcome: &Outcome) -> Value {
    let timings = outcome.timings();
    let dati = &task.profile.dati_preventivo;

    let mut payload = json!({
        "IdRicerca": dati.id_ricerca,
        "Provenienza_IdValore": PROVENANCE_ID,
        "DataInizio": timings.data_inizio,
        "DataFine": timings.data_fine,
        "ElapsedMs": timings.elapsed_ms,
    });

    match outcome {
        Outcome::Success { quotes, .. } if !quotes.is_empty() => {
            payload["success"] = json!(true);
            payload["status"] = json!(1);
            payload["message"] = json!("Data fetched successfully");
            payload["data"] = json!({
                "Quotes": quotes,
                "Assets": empty_assets(),
            });
        }
        Outcome::Success { .. } => {
            payload["error"] = json!(true);
            payload["status"] = json!(5);
            payload["reason"] = json!(crate::error::FailureReason::EmptyResults);
            payload["message"] = json!("Empty data");
            payload["data"] = json!({
                "Quotes": [],
                "Assets": empty_assets(),
            });
        }
        Outcome::Failure { reason, message, .. } => {
            payload["error"] = json!(true);
            payload["status"] = json!(5);
            payload["reason"] = json!(reason);
            payload["message"] = json!(message);
        }
    }

    payload
}

fn empty_assets() -> Value {
    json!({
        "Marca": "",
        "Modello": "",
        "Allestimento": "",
        "Valore": "",
        "Cilindrata": "",
        "DataImmatricolazione": "",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureReason;
    use crate::models::{Profile, QuoteRecord, Timings};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn task() -> Task {
        let profile: Profile = serde_json::from_value(serde_json::json!({
            "datiPreventivo": {
                "idRicerca": 42,
                "idAccordo": 7,
                "idFascia": 3
            },
            "anag": { "cf": "RSSMRA85T10A562S" },
            "veicolo": { "targa": "AB123CD", "tipoVeicolo": "autovettura" }
        }))
        .unwrap();
        Task::new(profile, None)
    }

    fn timings() -> Timings {
        Timings {
            data_inizio: "01/06/2025 10:00:00".to_string(),
            data_fine: "01/06/2025 10:02:30".to_string(),
            elapsed_ms: 150_000,
        }
    }

    fn quote() -> QuoteRecord {
        QuoteRecord {
            id_accordo: 7,
            id_fascia: 3,
            sito: "preventivass.it".to_string(),
            compagnia: "Compagnia Uno".to_string(),
            prodotto: "RCA".to_string(),
            guida: "Esperta".to_string(),
            prezzo_totale: "1234.56".to_string(),
            prezzo: Decimal::from_str("1234.56").unwrap(),
        }
    }

    #[test]
    fn test_payload_success() {
        let outcome = Outcome::Success {
            quotes: vec![quote()],
            timings: timings(),
        };
        let payload = build_payload(&task(), &outcome);

        assert_eq!(payload["success"], true);
        assert_eq!(payload["status"], 1);
        assert_eq!(payload["IdRicerca"], 42);
        assert_eq!(payload["Provenienza_IdValore"], 999969);
        assert_eq!(payload["data"]["Quotes"][0]["Compagnia"], "Compagnia Uno");
        assert_eq!(payload["data"]["Quotes"][0]["Prezzo_RCA"], "1234.56");
        assert_eq!(payload["data"]["Assets"]["Marca"], "");
    }

    #[test]
    fn test_payload_empty_success_is_error_envelope() {
        let outcome = Outcome::Success {
            quotes: vec![],
            timings: timings(),
        };
        let payload = build_payload(&task(), &outcome);

        assert_eq!(payload["error"], true);
        assert_eq!(payload["status"], 5);
        assert_eq!(payload["reason"], "EMPTY_RESULTS");
        assert_eq!(payload["message"], "Empty data");
        assert_eq!(payload["data"]["Quotes"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_payload_failure() {
        let outcome = Outcome::Failure {
            reason: FailureReason::ProxyCountry,
            message: "proxy egress country is 'DE', expected IT".to_string(),
            timings: timings(),
        };
        let payload = build_payload(&task(), &outcome);

        assert_eq!(payload["error"], true);
        assert_eq!(payload["status"], 5);
        assert_eq!(payload["reason"], "PROXY_COUNTRY");
        assert_eq!(payload["DataInizio"], "01/06/2025 10:00:00");
    }

    #[test]
    fn test_profile_parses_with_defaults() {
        let t = task();
        assert_eq!(t.profile.dati_preventivo.id_ricerca, 42);
        assert_eq!(t.profile.anag.cf, "RSSMRA85T10A562S");
        assert!(t.profile.portante.is_none());
        assert_eq!(t.profile.veicolo.cilindrata, "");
    }
}
