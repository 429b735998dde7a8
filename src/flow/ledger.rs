/// Per-field audit of the form run. Individual field failures are recorded
/// rather than aborting the flow; the ledger tells afterwards which fields
/// the screens actually accepted.
#[derive(Debug, Default)]
pub struct FieldLedger {
    entries: Vec<FieldEntry>,
}

#[derive(Debug)]
pub struct FieldEntry {
    pub field: String,
    pub ok: bool,
}

impl FieldLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, field: impl Into<String>, ok: bool) {
        let field = field.into();
        if !ok {
            tracing::warn!("📒 Field not applied: {}", field);
        }
        self.entries.push(FieldEntry { field, ok });
    }

    pub fn failed(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| !e.ok)
            .map(|e| e.field.as_str())
            .collect()
    }

    pub fn is_clean(&self) -> bool {
        self.entries.iter().all(|e| e.ok)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_tracks_failures() {
        let mut ledger = FieldLedger::new();
        ledger.record("targa", true);
        ledger.record("comune", false);
        ledger.record("civico", true);

        assert_eq!(ledger.len(), 3);
        assert!(!ledger.is_clean());
        assert_eq!(ledger.failed(), vec!["comune"]);
    }

    #[test]
    fn test_empty_ledger_is_clean() {
        assert!(FieldLedger::new().is_clean());
    }
}
