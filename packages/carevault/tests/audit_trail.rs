mod common;

use carevault::config::VaultConfig;
use carevault::model::{AuditAction, Role};
use carevault::{DenyReason, Error};
use common::World;

#[tokio::test]
async fn the_unfiltered_trail_is_admin_only() {
    let world = World::new().await;
    let (patient, patient_session) = world.admit_patient(&world.northside).await;
    let doctor = world.staff(Role::Doctor, &world.northside).await;

    world.vault.patient(&doctor, patient.id).await.unwrap();

    let entries = world.vault.audit_trail(&world.admin, None).await.unwrap();
    assert!(entries
        .iter()
        .any(|e| e.action == AuditAction::ViewPatient));
    // Reading the trail is itself audited
    assert!(entries
        .iter()
        .all(|e| e.action != AuditAction::ViewAuditTrail));
    let entries = world.vault.audit_trail(&world.admin, None).await.unwrap();
    assert!(entries
        .iter()
        .any(|e| e.action == AuditAction::ViewAuditTrail));

    for session in [&doctor, &patient_session] {
        let err = world.vault.audit_trail(session, None).await.unwrap_err();
        assert!(matches!(
            err,
            Error::AuthorizationDenied(DenyReason::InsufficientRole)
        ));
    }
}

#[tokio::test]
async fn patients_see_who_accessed_their_records() {
    let world = World::new().await;
    let (patient, patient_session) = world.admit_patient(&world.northside).await;
    let (other, _) = world.admit_patient(&world.northside).await;
    let doctor = world.staff(Role::Doctor, &world.northside).await;

    world.vault.patient(&doctor, patient.id).await.unwrap();

    let entries = world
        .vault
        .audit_trail_for_patient(&patient_session, patient.id, None)
        .await
        .unwrap();
    assert!(entries.iter().all(|e| e.patient_id == Some(patient.id)));
    let view = entries
        .iter()
        .find(|e| e.action == AuditAction::ViewPatient)
        .unwrap();
    assert_eq!(view.actor_id, doctor.caller().map(|c| c.user_id));

    // But never anyone else's trail
    let err = world
        .vault
        .audit_trail_for_patient(&patient_session, other.id, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::AuthorizationDenied(DenyReason::InsufficientRole)
    ));
}

#[tokio::test]
async fn trail_queries_are_capped_at_the_configured_page_size() {
    let mut config = VaultConfig::default();
    config.audit.page_size = 3;
    let world = World::with_config(config).await;

    let (patient, _) = world.admit_patient(&world.northside).await;
    let doctor = world.staff(Role::Doctor, &world.northside).await;
    for _ in 0..5 {
        world.vault.patient(&doctor, patient.id).await.unwrap();
    }

    let entries = world.vault.audit_trail(&world.admin, None).await.unwrap();
    assert_eq!(entries.len(), 3);
    // Newest first
    assert!(entries[0].at >= entries[1].at);
    assert!(entries[1].at >= entries[2].at);

    let entries = world
        .vault
        .audit_trail(&world.admin, Some(100))
        .await
        .unwrap();
    assert_eq!(entries.len(), 3);

    let entries = world.vault.audit_trail(&world.admin, Some(1)).await.unwrap();
    assert_eq!(entries.len(), 1);
}
