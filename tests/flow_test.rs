use preventivass_scraper::flow::{
    check_vehicle_displacement, entry_mode, screen_plan, EntryMode, Screen,
};
use preventivass_scraper::models::{Profile, Task, UseCaseChoice};

fn task_json(id_scelta: Option<i64>, tipo: &str, cilindrata: &str) -> Task {
    let profile: Profile = serde_json::from_value(serde_json::json!({
        "datiPreventivo": {
            "idRicerca": 77,
            "idAccordo": 5,
            "idFascia": 2,
            "idScelta": id_scelta
        },
        "anag": {
            "cf": "RSSMRA85T10A562S",
            "nascitaGiorno": "10",
            "nascitaMese": "12",
            "nascitaAnno": 1985
        },
        "veicolo": {
            "targa": "AB123CD",
            "tipoVeicolo": tipo,
            "cilindrata": cilindrata
        },
        "portante": {
            "cf": "VRDGPP80A01H501X",
            "targa": "EF456GH",
            "tipoVeicolo": "autovettura"
        }
    }))
    .unwrap();
    Task::new(profile, None)
}

#[test]
fn standard_car_goes_straight_to_vehicle_detail() {
    let task = task_json(Some(0), "autovettura", "1242");
    assert_eq!(task.use_case(), UseCaseChoice::Standard);

    let plan = screen_plan(task.use_case());
    assert_eq!(
        plan,
        vec![
            Screen::Entry,
            Screen::VehicleDetail,
            Screen::PersonalDetail,
            Screen::Confirmation,
            Screen::RiskGuidance,
            Screen::Results,
        ]
    );
    assert_eq!(
        entry_mode(task.use_case(), &task.profile.veicolo.tipo_veicolo),
        EntryMode::Renewal
    );
    assert!(check_vehicle_displacement(&task.profile.veicolo).is_ok());
}

#[test]
fn bersani_visits_the_certificate_screen_as_new_policy() {
    let task = task_json(Some(2), "autovettura", "1242");
    assert_eq!(task.use_case(), UseCaseChoice::Bersani);

    let plan = screen_plan(task.use_case());
    assert_eq!(plan[1], Screen::RiskCertificate);
    assert_eq!(
        entry_mode(task.use_case(), &task.profile.veicolo.tipo_veicolo),
        EntryMode::NewPolicy
    );
    assert_eq!(
        task.use_case().certificate_option(),
        Some("Bonus Famiglia")
    );
    assert_eq!(task.profile.portante.as_ref().unwrap().targa, "EF456GH");
}

#[test]
fn attestato_recovery_on_a_motorbike_renews() {
    let task = task_json(Some(3), "motociclo", "125");
    assert_eq!(task.use_case(), UseCaseChoice::RiskCertificateRecovery);
    assert_eq!(
        entry_mode(task.use_case(), &task.profile.veicolo.tipo_veicolo),
        EntryMode::Renewal
    );
    assert_eq!(
        task.use_case().certificate_option(),
        Some("Ho già un attestato su un altro veicolo")
    );
    assert!(check_vehicle_displacement(&task.profile.veicolo).is_ok());
}

#[test]
fn small_motorbike_is_rejected_before_any_session() {
    let task = task_json(Some(0), "motociclo", "50");
    let err = check_vehicle_displacement(&task.profile.veicolo).unwrap_err();
    assert!(err.is_business_rule());
}

#[test]
fn big_moped_is_rejected_before_any_session() {
    let task = task_json(Some(0), "ciclomotore", "125");
    assert!(check_vehicle_displacement(&task.profile.veicolo).is_err());
}

#[test]
fn missing_id_scelta_defaults_to_standard() {
    let task = task_json(None, "autovettura", "1242");
    assert_eq!(task.use_case(), UseCaseChoice::Standard);
    assert!(task.use_case().certificate_option().is_none());
}
