use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

use crate::error::PaymentError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckoutOperation {
    CreateSession { price_id: String, email: String },
    VerifySession { session_id: String },
    CreatePortal { customer_id: String },
}

/// Result of `VerifySession` as reported by the payment backend.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Verification {
    pub success: bool,
    pub product_id: Option<String>,
    pub stripe_customer_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentResponse {
    Redirect { url: String },
    Verified(Verification),
}

pub type PaymentResult = Result<PaymentResponse, PaymentError>;

impl Operation for CheckoutOperation {
    type Output = PaymentResult;
}

pub struct Checkout<Ev> {
    context: CapabilityContext<CheckoutOperation, Ev>,
}

impl<Ev> Capability<Ev> for Checkout<Ev> {
    type Operation = CheckoutOperation;
    type MappedSelf<MappedEv> = Checkout<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Checkout::new(self.context.map_event(f))
    }
}

impl<Ev> Checkout<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<CheckoutOperation, Ev>) -> Self {
        Self { context }
    }

    /// Resolves with the URL to send the browser to.
    pub fn create_session<F>(&self, price_id: &str, email: &str, make_event: F)
    where
        F: FnOnce(Result<String, PaymentError>) -> Ev + Send + 'static,
    {
        self.redirect(
            CheckoutOperation::CreateSession {
                price_id: price_id.to_string(),
                email: email.to_string(),
            },
            make_event,
        );
    }

    pub fn create_portal<F>(&self, customer_id: &str, make_event: F)
    where
        F: FnOnce(Result<String, PaymentError>) -> Ev + Send + 'static,
    {
        self.redirect(
            CheckoutOperation::CreatePortal {
                customer_id: customer_id.to_string(),
            },
            make_event,
        );
    }

    pub fn verify_session<F>(&self, session_id: &str, make_event: F)
    where
        F: FnOnce(Result<Verification, PaymentError>) -> Ev + Send + 'static,
    {
        let operation = CheckoutOperation::VerifySession {
            session_id: session_id.to_string(),
        };
        let context = self.context.clone();
        self.context.spawn(async move {
            let result = match context.request_from_shell(operation).await {
                Ok(PaymentResponse::Verified(verification)) => Ok(verification),
                Ok(PaymentResponse::Redirect { .. }) => Err(PaymentError::UnexpectedResponse),
                Err(e) => Err(e),
            };
            context.update_app(make_event(result));
        });
    }

    fn redirect<F>(&self, operation: CheckoutOperation, make_event: F)
    where
        F: FnOnce(Result<String, PaymentError>) -> Ev + Send + 'static,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            let result = match context.request_from_shell(operation).await {
                Ok(PaymentResponse::Redirect { url }) => Ok(url),
                Ok(PaymentResponse::Verified(_)) => Err(PaymentError::UnexpectedResponse),
                Err(e) => Err(e),
            };
            context.update_app(make_event(result));
        });
    }
}
