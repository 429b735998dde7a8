use crate::models::Anagrafica;
use serde_json::Value;

/// Known misspellings seen in inbound profiles that the geocoder will not
/// resolve on its own.
const TYPO_CORRECTIONS: &[(&str, &str)] = &[
    ("domencio", "domenico"),
    ("pietrarsa", "pietrarse"),
    ("fosso grande", "fossogrande"),
];

/// A residence address in the shape the form screens consume.
#[derive(Debug, Clone, PartialEq)]
pub struct Address {
    pub civico: String,
    pub via: String,
    pub indirizzo: String,
    pub comune: String,
    pub provincia: String,
}

impl From<&Anagrafica> for Address {
    fn from(anag: &Anagrafica) -> Self {
        Self {
            civico: anag.residenza_civico.clone(),
            via: anag.residenza_indirizzo_via.clone(),
            indirizzo: anag.residenza_indirizzo.clone(),
            comune: anag.residenza_comune.clone(),
            provincia: anag.residenza_provincia.clone(),
        }
    }
}

/// Normalizes residence addresses through the HERE geocoder so the form's
/// strict address validation accepts them. Lookup failure of any kind falls
/// back to the input unchanged.
pub struct AddressNormalizer {
    api_key: Option<String>,
    base_url: String,
    http: reqwest::Client,
}

impl AddressNormalizer {
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_base_url(api_key, "https://geocode.search.hereapi.com".to_string())
    }

    pub fn with_base_url(api_key: Option<String>, base_url: String) -> Self {
        Self {
            api_key,
            base_url,
            http: reqwest::Client::new(),
        }
    }

    /// Returns the geocoder's authoritative rendition of the address, or
    /// the input unchanged when no key is configured or the lookup fails.
    pub async fn normalize(&self, task_id: &str, input: Address) -> Address {
        let Some(ref api_key) = self.api_key else {
            tracing::debug!("TID: {} | 📍 No geocoder key, address used as-is", task_id);
            return input;
        };

        let query = format!(
            "{}, {} {}, {}, {}",
            input.civico, input.via, input.indirizzo, input.comune, input.provincia
        );

        let response = self
            .http
            .get(format!("{}/v1/geocode", self.base_url))
            .query(&[("q", query.as_str()), ("apiKey", api_key.as_str())])
            .timeout(std::time::Duration::from_secs(5))
            .send()
            .await;

        let body: Value = match response {
            Ok(resp) => match resp.json().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::warn!("TID: {} | 📍 Geocoder body unreadable: {}", task_id, e);
                    return input;
                }
            },
            Err(e) => {
                tracing::warn!("TID: {} | 📍 Geocoder unreachable: {}", task_id, e);
                return input;
            }
        };

        match parse_geocode_response(&body, &input) {
            Some(normalized) => {
                if normalized != input {
                    tracing::info!(
                        "TID: {} | 📍 Address normalized: '{} {}' -> '{} {}'",
                        task_id,
                        input.via,
                        input.indirizzo,
                        normalized.via,
                        normalized.indirizzo
                    );
                }
                normalized
            }
            None => {
                tracing::warn!("TID: {} | 📍 Geocoder returned no usable match", task_id);
                input
            }
        }
    }
}

/// Builds the normalized address from the first geocoder item, keeping the
/// input's value for any field the geocoder leaves out.
pub fn parse_geocode_response(body: &Value, input: &Address) -> Option<Address> {
    let address = body.get("items")?.as_array()?.first()?.get("address")?;

    let (via, indirizzo) = match address.get("street").and_then(Value::as_str) {
        Some(street) => split_street(street),
        None => (input.via.clone(), input.indirizzo.clone()),
    };

    Some(Address {
        civico: address
            .get("houseNumber")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| input.civico.clone()),
        via,
        indirizzo: apply_typo_corrections(&indirizzo),
        comune: address
            .get("city")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| input.comune.clone()),
        provincia: address
            .get("countyCode")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| input.provincia.clone()),
    })
}

/// Splits a geocoded street into its kind ("Via", "Piazza", ...) and name.
pub fn split_street(street: &str) -> (String, String) {
    match street.trim().split_once(char::is_whitespace) {
        Some((kind, name)) => (kind.to_string(), name.trim().to_string()),
        None => ("Via".to_string(), street.trim().to_string()),
    }
}

pub fn apply_typo_corrections(name: &str) -> String {
    let mut corrected = name.to_lowercase();
    for (wrong, right) in TYPO_CORRECTIONS {
        if corrected.contains(wrong) {
            corrected = corrected.replace(wrong, right);
        }
    }
    corrected
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input() -> Address {
        Address {
            civico: "10".to_string(),
            via: "Via".to_string(),
            indirizzo: "roma".to_string(),
            comune: "Napoli".to_string(),
            provincia: "NA".to_string(),
        }
    }

    #[test]
    fn test_split_street() {
        assert_eq!(
            split_street("Via San Domenico"),
            ("Via".to_string(), "San Domenico".to_string())
        );
        assert_eq!(
            split_street("Corso Umberto I"),
            ("Corso".to_string(), "Umberto I".to_string())
        );
        assert_eq!(split_street("Belvedere"), ("Via".to_string(), "Belvedere".to_string()));
    }

    #[test]
    fn test_typo_corrections() {
        assert_eq!(apply_typo_corrections("San Domencio"), "san domenico");
        assert_eq!(apply_typo_corrections("Fosso Grande"), "fossogrande");
        assert_eq!(apply_typo_corrections("Garibaldi"), "garibaldi");
    }

    #[test]
    fn test_parse_full_response() {
        let body = json!({
            "items": [{
                "address": {
                    "street": "Via San Domenico",
                    "houseNumber": "12",
                    "city": "Napoli",
                    "countyCode": "NA"
                }
            }]
        });
        let out = parse_geocode_response(&body, &input()).unwrap();
        assert_eq!(out.via, "Via");
        assert_eq!(out.indirizzo, "san domenico");
        assert_eq!(out.civico, "12");
        assert_eq!(out.comune, "Napoli");
        assert_eq!(out.provincia, "NA");
    }

    #[test]
    fn test_parse_partial_response_keeps_input_fields() {
        let body = json!({
            "items": [{
                "address": { "city": "Napoli" }
            }]
        });
        let out = parse_geocode_response(&body, &input()).unwrap();
        assert_eq!(out.via, "Via");
        assert_eq!(out.indirizzo, "roma");
        assert_eq!(out.civico, "10");
    }

    #[test]
    fn test_parse_empty_response() {
        assert!(parse_geocode_response(&json!({"items": []}), &input()).is_none());
        assert!(parse_geocode_response(&json!({}), &input()).is_none());
    }

    #[tokio::test]
    async fn test_normalize_falls_back_on_unreachable_geocoder() {
        let normalizer = AddressNormalizer::with_base_url(
            Some("test-key".to_string()),
            "http://127.0.0.1:9".to_string(),
        );
        let addr = input();
        let out = normalizer.normalize("test", addr.clone()).await;
        assert_eq!(out, addr);
    }

    #[tokio::test]
    async fn test_normalize_without_key_is_noop() {
        let normalizer = AddressNormalizer::new(None);
        let addr = input();
        let out = normalizer.normalize("test", addr.clone()).await;
        assert_eq!(out, addr);
    }
}
