use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;
use crate::media_store::GeneratedMedia;
use crate::request::{AspectRatio, GenerationRequest};

/// Ask the shell's generation service to fulfil a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOperation {
    pub owner: String,
    /// Output frame: the chosen ratio for photos, fixed for designs and video.
    pub aspect_ratio: AspectRatio,
    pub request: GenerationRequest,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOutput {
    pub media: Vec<GeneratedMedia>,
    /// Set when the service returned a degraded result. Such results are free.
    pub fallback_notice: Option<String>,
}

pub type GenerationResult = Result<GenerationOutput, GenerationError>;

impl Operation for GenerationOperation {
    type Output = GenerationResult;
}

pub struct Generator<Ev> {
    context: CapabilityContext<GenerationOperation, Ev>,
}

impl<Ev> Capability<Ev> for Generator<Ev> {
    type Operation = GenerationOperation;
    type MappedSelf<MappedEv> = Generator<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Generator::new(self.context.map_event(f))
    }
}

impl<Ev> Generator<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<GenerationOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn generate<F>(&self, owner: &str, request: GenerationRequest, make_event: F)
    where
        F: FnOnce(GenerationResult) -> Ev + Send + 'static,
    {
        let operation = GenerationOperation {
            owner: owner.to_string(),
            aspect_ratio: request.aspect_ratio(),
            request,
        };
        let context = self.context.clone();
        self.context.spawn(async move {
            let result = context.request_from_shell(operation).await;
            context.update_app(make_event(result));
        });
    }
}
