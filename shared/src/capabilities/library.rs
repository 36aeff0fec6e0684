use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::media_store::{GeneratedMedia, MediaId, MediaItem, MediaPage};

/// Requests against the user's media history. Served by `media_store::serve_library`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LibraryOperation {
    Append {
        owner: String,
        items: Vec<GeneratedMedia>,
    },
    Page {
        owner: String,
        page: u32,
        page_size: u32,
    },
    /// Lookup limited to the owner's own items.
    Get { owner: String, id: MediaId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LibraryResponse {
    Appended(Vec<MediaId>),
    Page(MediaPage),
    Item(Option<MediaItem>),
}

pub type LibraryOutput = Result<LibraryResponse, StorageError>;

impl Operation for LibraryOperation {
    type Output = LibraryOutput;
}

pub struct Library<Ev> {
    context: CapabilityContext<LibraryOperation, Ev>,
}

impl<Ev> Capability<Ev> for Library<Ev> {
    type Operation = LibraryOperation;
    type MappedSelf<MappedEv> = Library<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Library::new(self.context.map_event(f))
    }
}

impl<Ev> Library<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<LibraryOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn append<F>(&self, owner: &str, items: Vec<GeneratedMedia>, make_event: F)
    where
        F: FnOnce(Result<Vec<MediaId>, StorageError>) -> Ev + Send + 'static,
    {
        let expected = items.len();
        let operation = LibraryOperation::Append {
            owner: owner.to_string(),
            items,
        };
        self.request(operation, make_event, move |response| match response {
            LibraryResponse::Appended(ids) if ids.len() == expected => Some(ids),
            _ => None,
        });
    }

    pub fn page<F>(&self, owner: &str, page: u32, page_size: u32, make_event: F)
    where
        F: FnOnce(Result<MediaPage, StorageError>) -> Ev + Send + 'static,
    {
        let operation = LibraryOperation::Page {
            owner: owner.to_string(),
            page,
            page_size,
        };
        self.request(operation, make_event, |response| match response {
            LibraryResponse::Page(page) => Some(page),
            _ => None,
        });
    }

    pub fn fetch_owned<F>(&self, owner: &str, id: MediaId, make_event: F)
    where
        F: FnOnce(Result<Option<MediaItem>, StorageError>) -> Ev + Send + 'static,
    {
        let owner = owner.to_string();
        let operation = LibraryOperation::Get {
            owner: owner.clone(),
            id,
        };
        self.request(operation, make_event, move |response| match response {
            LibraryResponse::Item(item) => Some(item.filter(|item| item.owner == owner)),
            _ => None,
        });
    }

    fn request<T, F, P>(&self, operation: LibraryOperation, make_event: F, pick: P)
    where
        T: Send + 'static,
        F: FnOnce(Result<T, StorageError>) -> Ev + Send + 'static,
        P: FnOnce(LibraryResponse) -> Option<T> + Send + 'static,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            let result = context
                .request_from_shell(operation)
                .await
                .and_then(|response| pick(response).ok_or(StorageError::UnexpectedResponse));
            context.update_app(make_event(result));
        });
    }
}
