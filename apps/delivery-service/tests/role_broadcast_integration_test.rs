//! ロール単位の一斉配信の統合テスト

mod helpers;

use helpers::{DeliveryTestBuilder, input_for};
use ichiba_delivery_service::DeliveryError;
use ichiba_domain::{
    notification::NotificationType,
    user::{UserId, UserRole},
};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn ロールの全員に個別の通知を作成する() {
    let builder = DeliveryTestBuilder::new();
    let vendors: Vec<UserId> = (0..3)
        .map(|i| builder.recipient(&format!("vendor{i}@example.com")))
        .collect();
    for vendor in &vendors {
        builder.directory.assign_role(UserRole::Vendor, vendor);
    }
    let admin = builder.recipient("admin@example.com");
    builder.directory.assign_role(UserRole::Admin, &admin);
    let sut = builder.build();

    let report = sut
        .send_to_role(
            UserRole::Vendor,
            input_for(&UserId::generate(), NotificationType::SystemAlert),
        )
        .await
        .unwrap();

    assert_eq!(report.notifications.len(), 3);
    assert!(report.failures.is_empty());
    let mut recipients: Vec<_> = report
        .notifications
        .iter()
        .map(|n| n.user_id().clone())
        .collect();
    recipients.sort();
    let mut expected = vendors.clone();
    expected.sort();
    assert_eq!(recipients, expected);
    assert_eq!(builder.email.sent_emails().len(), 3);
    assert!(builder.email.sent_emails().iter().all(|e| e.to != "admin@example.com"));
}

#[tokio::test]
async fn 一部の受信者で保存に失敗しても残りには配信する() {
    let builder = DeliveryTestBuilder::new();
    let vendors: Vec<UserId> = (0..3)
        .map(|i| builder.recipient(&format!("vendor{i}@example.com")))
        .collect();
    for vendor in &vendors {
        builder.directory.assign_role(UserRole::Vendor, vendor);
    }
    builder.repository.fail_inserts_for(&vendors[1]);
    let sut = builder.build();

    let report = sut
        .send_to_role(
            UserRole::Vendor,
            input_for(&UserId::generate(), NotificationType::CommissionUpdate),
        )
        .await
        .unwrap();

    assert_eq!(report.notifications.len(), 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].user_id, vendors[1]);
    assert!(matches!(report.failures[0].error, DeliveryError::Repository(_)));
    assert_eq!(builder.repository.all().len(), 2);
    // 配信は保存より先に行う
    assert_eq!(builder.realtime.pushed().len(), 3);
}

#[tokio::test]
async fn 該当者のいないロールでは何も作成しない() {
    let builder = DeliveryTestBuilder::new();
    let sut = builder.build();

    let report = sut
        .send_to_role(
            UserRole::Staff,
            input_for(&UserId::generate(), NotificationType::SystemAlert),
        )
        .await
        .unwrap();

    assert!(report.notifications.is_empty());
    assert!(report.failures.is_empty());
    assert_eq!(builder.email.attempts() + builder.realtime.attempts(), 0);
}

#[tokio::test]
async fn ディレクトリが使えなければ一斉配信は失敗する() {
    let builder = DeliveryTestBuilder::new();
    let vendor = builder.recipient("vendor@example.com");
    builder.directory.assign_role(UserRole::Vendor, &vendor);
    builder.directory.set_unavailable(true);
    let sut = builder.build();

    let error = sut
        .send_to_role(
            UserRole::Vendor,
            input_for(&UserId::generate(), NotificationType::SystemAlert),
        )
        .await
        .unwrap_err();

    assert!(matches!(error, DeliveryError::Directory(_)));
    assert!(builder.repository.all().is_empty());
}
