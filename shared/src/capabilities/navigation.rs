use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

/// Browser location changes. Both resolve with `()` once the shell has acted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NavigationOperation {
    /// Leave the app, e.g. for a hosted checkout page.
    Redirect { url: String },
    /// Rewrite the address bar without reloading.
    ReplaceUrl { url: String },
}

impl Operation for NavigationOperation {
    type Output = ();
}

pub struct Navigation<Ev> {
    context: CapabilityContext<NavigationOperation, Ev>,
}

impl<Ev> Capability<Ev> for Navigation<Ev> {
    type Operation = NavigationOperation;
    type MappedSelf<MappedEv> = Navigation<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Navigation::new(self.context.map_event(f))
    }
}

impl<Ev> Navigation<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<NavigationOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn redirect(&self, url: impl Into<String>) {
        self.send(NavigationOperation::Redirect { url: url.into() });
    }

    pub fn replace_url(&self, url: impl Into<String>) {
        self.send(NavigationOperation::ReplaceUrl { url: url.into() });
    }

    fn send(&self, operation: NavigationOperation) {
        let context = self.context.clone();
        self.context.spawn(async move {
            context.request_from_shell(operation).await;
        });
    }
}
