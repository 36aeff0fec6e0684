mod common;

use common::{member, Harness};
use shared::account::Plan;
use shared::capabilities::{CheckoutOperation, NavigationOperation, PaymentResponse, Verification};
use shared::error::PaymentError;
use shared::{AppState, ErrorKind, Event};

const HOME: &str = "https://app.example.com/";
const CREATOR: &str = "prod_T9T0AxuPBbXbCC";
const SMALL_PACK: &str = "prod_T9TD33RLHNcb15";

fn verified(product_id: &str) -> PaymentResponse {
    PaymentResponse::Verified(Verification {
        success: true,
        product_id: Some(product_id.to_string()),
        stripe_customer_id: Some("cus_123".into()),
    })
}

#[tokio::test]
async fn successful_checkout_return_upgrades_the_account() {
    let mut h = Harness::new().with_saved_account(&member("buyer@example.com", 3));

    h.boot("https://app.example.com/?checkout=success&session_id=abc")
        .await;

    // The one-shot parameters are gone before anything else happens.
    assert_eq!(
        h.navigations.first(),
        Some(&NavigationOperation::ReplaceUrl {
            url: HOME.to_string()
        })
    );
    assert_eq!(h.model.state, AppState::VerifyingPayment);
    assert_eq!(
        h.payments[0].operation,
        CheckoutOperation::VerifySession {
            session_id: "abc".into()
        }
    );

    h.resolve_payment(Ok(verified(CREATOR))).await;

    assert_eq!(h.model.state, AppState::Success);
    let account = h.model.account.member().unwrap();
    assert_eq!(account.credits, 203);
    assert_eq!(account.plan, Plan::Creator);
    assert!(account.has_made_purchase);
    assert_eq!(account.stripe_customer_id.as_deref(), Some("cus_123"));

    let saved = h.stored_account("buyer@example.com").unwrap();
    assert_eq!(saved["credits"], 203);
    assert_eq!(saved["plan"], "creator");
    assert!(h
        .model
        .status_message
        .as_deref()
        .is_some_and(|m| m.contains("Creator")));

    h.send(Event::ContinueFromSuccess).await;
    assert_eq!(h.model.state, AppState::Landing);
    assert!(shared::view::project(&h.model)
        .account
        .unwrap()
        .can_manage_subscription);
}

#[tokio::test]
async fn credit_pack_keeps_the_current_plan() {
    let mut h = Harness::new().with_saved_account(&member("topup@example.com", 0));
    h.boot("https://app.example.com/?checkout=success&session_id=pack")
        .await;
    h.resolve_payment(Ok(verified(SMALL_PACK))).await;

    let account = h.model.account.member().unwrap();
    assert_eq!(account.credits, 100);
    assert_eq!(account.plan, Plan::Free);
    assert!(account.has_made_purchase);
}

#[tokio::test]
async fn failed_verification_lands_on_cancel_without_credit() {
    let mut h = Harness::new().with_saved_account(&member("declined@example.com", 3));
    h.boot("https://app.example.com/?checkout=success&session_id=bad")
        .await;

    h.resolve_payment(Ok(PaymentResponse::Verified(Verification::default())))
        .await;

    assert_eq!(h.model.state, AppState::Cancel);
    assert_eq!(h.credits(), 3);
    assert!(h.model.status_message.is_some());
}

#[tokio::test]
async fn verification_service_error_lands_on_cancel() {
    let mut h = Harness::new().with_saved_account(&member("offline@example.com", 3));
    h.boot("https://app.example.com/?checkout=success&session_id=x")
        .await;

    h.resolve_payment(Err(PaymentError::Verification("timeout".into())))
        .await;

    assert_eq!(h.model.state, AppState::Cancel);
    assert_eq!(h.credits(), 3);
}

#[tokio::test]
async fn verified_purchase_without_a_signed_in_account_is_not_applied() {
    let mut h = Harness::new();
    h.boot("https://app.example.com/?checkout=success&session_id=abc")
        .await;

    h.resolve_payment(Ok(verified(CREATOR))).await;

    assert_eq!(h.model.state, AppState::Cancel);
    assert!(h.model.account.is_guest());
}

#[tokio::test]
async fn cancelled_checkout_shows_the_cancel_screen() {
    let mut h = Harness::new().with_saved_account(&member("undecided@example.com", 3));
    h.boot("https://app.example.com/?checkout=cancel").await;

    assert_eq!(h.model.state, AppState::Cancel);
    assert!(h.payments.is_empty());
    assert_eq!(
        h.navigations,
        vec![NavigationOperation::ReplaceUrl {
            url: HOME.to_string()
        }]
    );

    h.send(Event::RetryPricing).await;
    assert_eq!(h.model.state, AppState::Landing);
}

#[tokio::test]
async fn success_without_a_session_just_lands() {
    let mut h = Harness::new().with_saved_account(&member("odd@example.com", 3));
    h.boot("https://app.example.com/?checkout=success").await;

    assert_eq!(h.model.state, AppState::Landing);
    assert!(h.payments.is_empty());
    assert_eq!(h.navigations.len(), 1);
}

#[tokio::test]
async fn guest_checkout_resumes_after_sign_in() {
    let mut h = Harness::new();
    h.boot(HOME).await;

    h.send(Event::CheckoutRequested {
        price_id: "price_creator".into(),
    })
    .await;
    assert_eq!(h.model.state, AppState::Auth);
    assert!(h.payments.is_empty());

    h.sign_in("shopper@example.com").await;
    assert_eq!(h.model.state, AppState::VerifyingPayment);
    assert_eq!(
        h.payments[0].operation,
        CheckoutOperation::CreateSession {
            price_id: "price_creator".into(),
            email: "shopper@example.com".into(),
        }
    );

    h.resolve_payment(Ok(PaymentResponse::Redirect {
        url: "https://checkout.example.com/c/pay".into(),
    }))
    .await;
    assert_eq!(
        h.navigations.last(),
        Some(&NavigationOperation::Redirect {
            url: "https://checkout.example.com/c/pay".into()
        })
    );
}

#[tokio::test]
async fn checkout_session_failure_returns_to_landing() {
    let mut h = Harness::new().with_saved_account(&member("shopper@example.com", 3));
    h.boot(HOME).await;
    h.send(Event::CheckoutRequested {
        price_id: "price_pack".into(),
    })
    .await;

    h.resolve_payment(Err(PaymentError::Checkout("card network down".into())))
        .await;

    assert_eq!(h.model.state, AppState::Landing);
    assert_eq!(
        h.model.error.as_ref().map(|e| e.kind),
        Some(ErrorKind::Payment)
    );
    assert!(h.navigations.is_empty());
}

#[tokio::test]
async fn free_plan_cannot_open_the_billing_portal() {
    let mut h = Harness::new().with_saved_account(&member("free@example.com", 3));
    h.boot(HOME).await;

    h.send(Event::ManageSubscription).await;

    assert_eq!(h.model.state, AppState::Landing);
    assert!(h.model.notice.is_some());
    assert!(h.payments.is_empty());
}

#[tokio::test]
async fn subscriber_is_sent_to_the_billing_portal() {
    let mut account = member("subscriber@example.com", 300);
    account.plan = Plan::Professional;
    account.stripe_customer_id = Some("cus_pro".into());
    let mut h = Harness::new().with_saved_account(&account);
    h.boot(HOME).await;

    h.send(Event::ManageSubscription).await;
    assert_eq!(
        h.payments[0].operation,
        CheckoutOperation::CreatePortal {
            customer_id: "cus_pro".into()
        }
    );

    h.resolve_payment(Ok(PaymentResponse::Redirect {
        url: "https://billing.example.com/p/session".into(),
    }))
    .await;
    assert_eq!(
        h.navigations,
        vec![NavigationOperation::Redirect {
            url: "https://billing.example.com/p/session".into()
        }]
    );
}
