use crate::address::Address;
use crate::browser::Interactor;
use crate::captcha::ChallengeSolver;
use crate::config::Config;
use crate::error::ScrapeError;
use crate::flow::extractor::extract_quotes;
use crate::flow::ledger::FieldLedger;
use crate::flow::selectors::Selectors;
use crate::models::{
    compute_age, guidance_label, needs_expert_guidance, QuoteRecord, Task, UseCaseChoice, Veicolo,
};
use crate::utils::mask_sensitive;
use chrono::NaiveDate;
use std::time::Duration;
use tokio::time::sleep;

/// The form screens in traversal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Entry,
    RiskCertificate,
    VehicleDetail,
    PersonalDetail,
    Confirmation,
    RiskGuidance,
    Results,
}

/// The screens a given use case actually visits. Only the non-standard
/// flows see the risk-certificate screen.
pub fn screen_plan(use_case: UseCaseChoice) -> Vec<Screen> {
    let mut plan = vec![Screen::Entry];
    if use_case != UseCaseChoice::Standard {
        plan.push(Screen::RiskCertificate);
    }
    plan.extend([
        Screen::VehicleDetail,
        Screen::PersonalDetail,
        Screen::Confirmation,
        Screen::RiskGuidance,
        Screen::Results,
    ]);
    plan
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryMode {
    NewPolicy,
    Renewal,
}

/// The standard flow always renews against the quoted plate. The other use
/// cases start a new policy, except for two-wheelers where the site only
/// offers the renewal path.
pub fn entry_mode(use_case: UseCaseChoice, tipo_veicolo: &str) -> EntryMode {
    if use_case == UseCaseChoice::Standard {
        return EntryMode::Renewal;
    }
    let tipo = tipo_veicolo.to_lowercase();
    if tipo.contains("motociclo") || tipo.contains("ciclomotore") {
        EntryMode::Renewal
    } else {
        EntryMode::NewPolicy
    }
}

/// Pre-flight engine displacement check. The site hard-rejects a motociclo
/// of 50cc or less and a ciclomotore above 50cc, so these profiles fail
/// before a browser session is spent on them.
pub fn check_vehicle_displacement(veicolo: &Veicolo) -> Result<(), ScrapeError> {
    let tipo = veicolo.tipo_veicolo.to_lowercase();
    let cc: i64 = veicolo.cilindrata.trim().parse().unwrap_or(0);

    if tipo.contains("motociclo") && cc <= 50 {
        return Err(ScrapeError::Displacement(format!(
            "motociclo requires displacement above 50cc, got {}",
            veicolo.cilindrata
        )));
    }
    if tipo.contains("ciclomotore") && cc > 50 {
        return Err(ScrapeError::Displacement(format!(
            "ciclomotore requires displacement of 50cc or less, got {}",
            veicolo.cilindrata
        )));
    }
    Ok(())
}

/// Label of the carrier-plate input on the risk-certificate screen. Only
/// Bersani gets the dedicated reference field; attestato recovery reuses
/// the plain plate input.
pub fn carrier_plate_label(use_case: UseCaseChoice) -> &'static str {
    match use_case {
        UseCaseChoice::Bersani => "Targa di riferimento",
        _ => "Targa",
    }
}

/// Datepicker input rendition of a date, e.g. "Mon Mar 10 2025".
fn datepicker_date(day: &str, month: &str, year: i32) -> Option<String> {
    let date = NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?)?;
    Some(date.format("%a %b %d %Y").to_string())
}

const JS_TOGGLE_SWITCHER: &str = r#"
    const checkbox = arguments[0];
    if (checkbox && !checkbox.checked) {
        checkbox.checked = true;
        checkbox.dispatchEvent(new Event('checkedChange', { bubbles: true }));
        checkbox.dispatchEvent(new Event('change', { bubbles: true }));
        checkbox.dispatchEvent(new Event('ngModelChange', { bubbles: true }));
        checkbox.dispatchEvent(new Event('blur', { bubbles: true }));
        return true;
    }
    return false;
"#;

/// Drives the multi-screen quote form for one task. Field-level failures
/// are recorded in the ledger and the flow pushes on; screen-level fatal
/// dialogs abort with the matching business error.
pub struct FlowEngine<'a> {
    interactor: &'a Interactor,
    challenge: ChallengeSolver<'a>,
    config: &'a Config,
    task: &'a Task,
    address: Address,
    ledger: FieldLedger,
}

impl<'a> FlowEngine<'a> {
    pub fn new(
        interactor: &'a Interactor,
        challenge: ChallengeSolver<'a>,
        config: &'a Config,
        task: &'a Task,
        address: Address,
    ) -> Self {
        Self {
            interactor,
            challenge,
            config,
            task,
            address,
            ledger: FieldLedger::new(),
        }
    }

    pub fn ledger(&self) -> &FieldLedger {
        &self.ledger
    }

    /// Walks the screen plan for the task's use case and returns the
    /// extracted quote records.
    pub async fn run(&mut self) -> Result<Vec<QuoteRecord>, ScrapeError> {
        let use_case = self.task.use_case();
        tracing::info!(
            "TID: {} | 🧭 Flow started | use case: {} | plate: {}",
            self.task.id,
            use_case.label(),
            mask_sensitive(&self.task.profile.veicolo.targa)
        );

        let mut quotes = Vec::new();
        for screen in screen_plan(use_case) {
            tracing::info!("TID: {} | 🧭 Screen: {:?}", self.task.id, screen);
            match screen {
                Screen::Entry => self.entry_screen(use_case).await?,
                Screen::RiskCertificate => self.risk_certificate_screen(use_case).await?,
                Screen::VehicleDetail => self.vehicle_detail_screen().await?,
                Screen::PersonalDetail => self.personal_detail_screen().await?,
                Screen::Confirmation => self.confirmation_screen().await?,
                Screen::RiskGuidance => self.risk_guidance_screen().await?,
                Screen::Results => quotes = self.results_screen().await?,
            }
        }

        if !self.ledger.is_clean() {
            tracing::warn!(
                "TID: {} | 📒 Flow finished with unapplied fields: {:?}",
                self.task.id,
                self.ledger.failed()
            );
        }
        Ok(quotes)
    }

    async fn entry_screen(&mut self, use_case: UseCaseChoice) -> Result<(), ScrapeError> {
        let profile = &self.task.profile;

        // The consent banner only shows on a fresh browser profile.
        let consent = self
            .interactor
            .click("consent banner", Selectors::CONSENT_BUTTON, Duration::from_secs(5))
            .await?;
        if consent {
            tracing::debug!("TID: {} | Consent accepted", self.task.id);
        }

        let mode = entry_mode(use_case, &profile.veicolo.tipo_veicolo);
        let (mode_selector, mode_name) = match mode {
            EntryMode::NewPolicy => (Selectors::NEW_POLICY_RADIO, "Nuova Polizza"),
            EntryMode::Renewal => (Selectors::RENEW_POLICY_RADIO, "Rinnovo Polizza"),
        };
        let ok = self
            .interactor
            .click(mode_name, mode_selector, Duration::from_secs(10))
            .await?;
        self.ledger.record("entry mode", ok);

        let ok = self
            .interactor
            .click(
                "vehicle type",
                &Selectors::vehicle_picker(&profile.veicolo.tipo_veicolo),
                Duration::from_secs(10),
            )
            .await?;
        self.ledger.record("vehicle type", ok);

        if mode == EntryMode::NewPolicy {
            let ok = self
                .interactor
                .click(
                    "plate available",
                    Selectors::HAS_PLATE_RADIO,
                    Duration::from_secs(5),
                )
                .await?;
            self.ledger.record("plate available", ok);
        }

        let ok = self
            .interactor
            .enter_text(
                "tax code",
                &Selectors::mat_input("Codice Fiscale"),
                &profile.anag.cf,
            )
            .await?;
        self.ledger.record("tax code", ok);

        let ok = self
            .interactor
            .enter_text("plate", &Selectors::mat_input("Targa"), &profile.veicolo.targa)
            .await?;
        self.ledger.record("plate", ok);

        self.challenge.solve(&self.config.target_url).await?;

        self.submit_and_check("entry").await
    }

    async fn risk_certificate_screen(&mut self, use_case: UseCaseChoice) -> Result<(), ScrapeError> {
        let profile = &self.task.profile;

        if let Some(option) = use_case.certificate_option() {
            let ok = self
                .interactor
                .select("risk certificate option", "Attestato di rischio", option)
                .await?;
            self.ledger.record("risk certificate option", ok);
        }

        match use_case {
            UseCaseChoice::Bersani => {
                if let Some(portante) = &profile.portante {
                    let ok = self
                        .interactor
                        .enter_text(
                            "carrier tax code",
                            &Selectors::mat_input("Codice Fiscale"),
                            &portante.cf,
                        )
                        .await?;
                    self.ledger.record("carrier tax code", ok);

                    let ok = self
                        .interactor
                        .enter_text(
                            "carrier plate",
                            &Selectors::mat_input(carrier_plate_label(use_case)),
                            &portante.targa,
                        )
                        .await?;
                    self.ledger.record("carrier plate", ok);
                } else {
                    tracing::warn!("TID: {} | Bersani flow without carrier data", self.task.id);
                }
            }
            UseCaseChoice::RiskCertificateRecovery => {
                if let Some(portante) = &profile.portante {
                    let ok = self
                        .interactor
                        .click(
                            "carrier vehicle type",
                            &Selectors::vehicle_picker(&portante.tipo_veicolo),
                            Duration::from_secs(10),
                        )
                        .await?;
                    self.ledger.record("carrier vehicle type", ok);

                    let ok = self
                        .interactor
                        .enter_text(
                            "carrier plate",
                            &Selectors::mat_input(carrier_plate_label(use_case)),
                            &portante.targa,
                        )
                        .await?;
                    self.ledger.record("carrier plate", ok);
                } else {
                    tracing::warn!(
                        "TID: {} | Attestato recovery flow without carrier data",
                        self.task.id
                    );
                }
            }
            _ => {}
        }

        self.submit_and_check("risk certificate").await
    }

    async fn vehicle_detail_screen(&mut self) -> Result<(), ScrapeError> {
        let veicolo = &self.task.profile.veicolo;

        let ok = self
            .interactor
            .select("extra fuel", "Alimentazione aggiuntiva", "Nessuna")
            .await?;
        self.ledger.record("extra fuel", ok);

        let ok = self
            .interactor
            .select("main usage", "Utilizzo principale", "Tragitto Casa-Lavoro")
            .await?;
        self.ledger.record("main usage", ok);

        let ok = self
            .interactor
            .select("annual mileage", "Percorrenza annua", "15000 Km")
            .await?;
        self.ledger.record("annual mileage", ok);

        if let Some(purchase) = datepicker_date(
            &veicolo.acquisto_giorno,
            &veicolo.acquisto_mese,
            veicolo.acquisto_anno,
        ) {
            let ok = self
                .interactor
                .enter_text(
                    "purchase date",
                    &Selectors::mat_input("Anno e mese di acquisto"),
                    &purchase,
                )
                .await?;
            self.ledger.record("purchase date", ok);
        } else {
            self.ledger.record("purchase date", false);
        }

        if !veicolo.allestimento.is_empty() {
            let ok = self
                .interactor
                .select_with_query("trim level", "Allestimento", &veicolo.allestimento)
                .await?;
            self.ledger.record("trim level", ok);
        }

        if let Some(registration) = datepicker_date(
            &veicolo.immatricolazione_giorno,
            &veicolo.immatricolazione_mese,
            veicolo.immatricolazione_anno,
        ) {
            let ok = self
                .interactor
                .enter_text(
                    "registration date",
                    &Selectors::mat_input("Data di prima immatricolazione"),
                    &registration,
                )
                .await?;
            self.ledger.record("registration date", ok);
        } else {
            self.ledger.record("registration date", false);
        }

        self.submit_and_check("vehicle detail").await
    }

    async fn personal_detail_screen(&mut self) -> Result<(), ScrapeError> {
        let anag = &self.task.profile.anag;

        let ok = self
            .interactor
            .select("marital status", "Stato civile", "Altro")
            .await?;
        self.ledger.record("marital status", ok);

        let ok = self
            .interactor
            .select("cars in household", "Numero di auto nel nucleo familiare", "2")
            .await?;
        self.ledger.record("cars in household", ok);

        if let Some(birth) = datepicker_date(&anag.nascita_giorno, &anag.nascita_mese, anag.nascita_anno)
        {
            let ok = self
                .interactor
                .enter_text("birth date", &Selectors::mat_input("Data di nascita"), &birth)
                .await?;
            self.ledger.record("birth date", ok);
        } else {
            self.ledger.record("birth date", false);
        }

        let ok = self
            .interactor
            .select("education", "Titolo di studio", "Diploma")
            .await?;
        self.ledger.record("education", ok);

        let ok = self
            .interactor
            .select(
                "profession",
                "Professione",
                "Impiegato/Quadro/Funzionario Privato",
            )
            .await?;
        self.ledger.record("profession", ok);

        let ok = self
            .interactor
            .select("children", "Figli", "Si (Solo minori di 18 anni)")
            .await?;
        self.ledger.record("children", ok);

        let ok = self
            .interactor
            .select("youngest driver age", "Età guidatore più giovane", "25+")
            .await?;
        self.ledger.record("youngest driver age", ok);

        let ok = self
            .interactor
            .click(
                "license possession",
                Selectors::HAS_LICENSE_RADIO,
                Duration::from_secs(5),
            )
            .await?;
        self.ledger.record("license possession", ok);

        if !anag.patente_anno.is_empty() {
            let ok = self
                .interactor
                .enter_text(
                    "license year",
                    &Selectors::mat_input("Inserisci anno di conseguimento della patente"),
                    &anag.patente_anno,
                )
                .await?;
            self.ledger.record("license year", ok);
        }

        // Residence, in the order the form cascades its dropdowns.
        let ok = self
            .interactor
            .select_with_query("province", "Provincia", &self.address.provincia)
            .await?;
        self.ledger.record("province", ok);

        let ok = self
            .interactor
            .select_with_query("municipality", "Comune", &self.address.comune)
            .await?;
        self.ledger.record("municipality", ok);

        let street_query = format!("{} {}", self.address.via, self.address.indirizzo);
        let ok = self
            .interactor
            .select_with_query("street", "Indirizzo", &street_query)
            .await?;
        self.ledger.record("street", ok);

        let ok = self
            .interactor
            .enter_text(
                "house number",
                &Selectors::mat_input("Civico"),
                &self.address.civico,
            )
            .await?;
        self.ledger.record("house number", ok);

        self.submit_and_check("personal detail").await
    }

    async fn confirmation_screen(&mut self) -> Result<(), ScrapeError> {
        self.submit_and_check("confirmation").await
    }

    async fn risk_guidance_screen(&mut self) -> Result<(), ScrapeError> {
        let anag = &self.task.profile.anag;
        let age = anag
            .birth_date()
            .map(|birth| compute_age(birth, chrono::Utc::now().date_naive()))
            .unwrap_or(0);

        tracing::info!(
            "TID: {} | 🛞 Guidance: {} (age {})",
            self.task.id,
            guidance_label(age),
            age
        );

        if needs_expert_guidance(age) {
            // The switcher only appears once its card header has rendered.
            if self
                .interactor
                .check_element(
                    "expert guidance header",
                    Selectors::EXPERT_GUIDE_HEADER,
                    Duration::from_secs(10),
                )
                .await?
                .is_none()
            {
                tracing::warn!(
                    "TID: {} | Expert guidance card not rendered",
                    self.task.id
                );
            }

            let checkbox = self
                .interactor
                .check_element(
                    "expert guidance switch",
                    Selectors::EXPERT_GUIDE_CHECKBOX,
                    Duration::from_secs(10),
                )
                .await?;

            match checkbox {
                Some(elem) => {
                    let toggled = self
                        .interactor
                        .execute(JS_TOGGLE_SWITCHER, vec![serde_json::to_value(&elem)
                            .map_err(crate::error::ElementError::from)?])
                        .await?;
                    self.ledger
                        .record("expert guidance", toggled.as_bool().unwrap_or(false));
                    sleep(Duration::from_secs(1)).await;
                }
                None => self.ledger.record("expert guidance", false),
            }
        }

        self.submit_and_check("risk guidance").await
    }

    async fn results_screen(&mut self) -> Result<Vec<QuoteRecord>, ScrapeError> {
        // A recap dialog covers the results until dismissed.
        if self
            .interactor
            .check_element(
                "summary dialog",
                Selectors::SUMMARY_DIALOG_HEADING,
                Duration::from_secs(10),
            )
            .await?
            .is_some()
        {
            self.interactor
                .click(
                    "summary dialog continue",
                    &Selectors::continue_button(Selectors::SUMMARY_DIALOG_ROOT),
                    Duration::from_secs(5),
                )
                .await?;
        }

        self.check_for_fatal().await?;

        let anag = &self.task.profile.anag;
        let age = anag
            .birth_date()
            .map(|birth| compute_age(birth, chrono::Utc::now().date_naive()))
            .unwrap_or(0);

        extract_quotes(
            self.interactor,
            &self.task.id,
            &self.task.profile.dati_preventivo,
            guidance_label(age),
        )
        .await
    }

    /// Clicks the screen's Prosegui and checks for the fatal dialogs the
    /// site raises when it rejects the submission.
    async fn submit_and_check(&mut self, screen: &str) -> Result<(), ScrapeError> {
        let clicked = self
            .interactor
            .click(
                &format!("{} continue", screen),
                &Selectors::continue_button(""),
                Duration::from_secs(15),
            )
            .await?;

        if !clicked {
            return Err(ScrapeError::PageLoad(format!(
                "continue button missing on {} screen",
                screen
            )));
        }

        sleep(Duration::from_secs(2)).await;
        self.check_for_fatal().await
    }

    async fn check_for_fatal(&self) -> Result<(), ScrapeError> {
        if self
            .interactor
            .check_element("error dialog", Selectors::DIALOG_ERROR, Duration::from_secs(2))
            .await?
            .is_some()
        {
            return Err(ScrapeError::PreRegistration);
        }

        if self
            .interactor
            .check_element(
                "address check dialog",
                Selectors::DIALOG_CHECK_ADDRESS,
                Duration::from_secs(2),
            )
            .await?
            .is_some()
        {
            return Err(ScrapeError::AddressRejected);
        }

        if self
            .interactor
            .check_element(
                "service error page",
                Selectors::SERVICE_ERROR_PAGE,
                Duration::from_secs(2),
            )
            .await?
            .is_some()
        {
            return Err(ScrapeError::ServiceErrorPage);
        }

        Ok(())
    }
}
