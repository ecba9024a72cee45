//! Project factories
//!
//! An organization's navigators report every repository they can see. The
//! organization's factories decide which of those become projects, and
//! which sources the project reads its branches from.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::provider::{DiscoveredRepository, Navigator, ProviderResult, Source};

/// Turns a discovered repository into a project, or declines it.
#[async_trait]
pub trait ProjectFactory: Send + Sync {
    fn id(&self) -> &str;

    /// Sources for the repository's project, or `None` if this factory does
    /// not recognise the repository.
    async fn recognize(
        &self,
        navigator: &dyn Navigator,
        repository: &DiscoveredRepository,
    ) -> ProviderResult<Option<Vec<Arc<dyn Source>>>>;
}

type Criteria = dyn Fn(&DiscoveredRepository) -> bool + Send + Sync;

/// Recognises repositories matching its criteria and reads them through the
/// navigator's source. Without criteria every repository is recognised.
#[derive(Clone, Default)]
pub struct BasicProjectFactory {
    criteria: Option<Arc<Criteria>>,
}

impl BasicProjectFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_criteria(
        criteria: impl Fn(&DiscoveredRepository) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            criteria: Some(Arc::new(criteria)),
        }
    }

    pub fn into_arc(self) -> Arc<dyn ProjectFactory> {
        Arc::new(self)
    }
}

#[async_trait]
impl ProjectFactory for BasicProjectFactory {
    fn id(&self) -> &str {
        "basic"
    }

    async fn recognize(
        &self,
        navigator: &dyn Navigator,
        repository: &DiscoveredRepository,
    ) -> ProviderResult<Option<Vec<Arc<dyn Source>>>> {
        let matches = self.criteria.as_ref().is_none_or(|criteria| criteria(repository));
        Ok(matches.then(|| vec![navigator.source_for(repository)]))
    }
}

impl fmt::Debug for BasicProjectFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicProjectFactory")
            .field("criteria", &self.criteria.is_some())
            .finish()
    }
}

/// Run factories in order; the first to recognise the repository wins.
pub(crate) async fn recognize(
    factories: &[Arc<dyn ProjectFactory>],
    navigator: &dyn Navigator,
    repository: &DiscoveredRepository,
) -> ProviderResult<Option<Vec<Arc<dyn Source>>>> {
    for factory in factories {
        if let Some(sources) = factory.recognize(navigator, repository).await? {
            tracing::trace!(factory = factory.id(), repository = %repository.name, "Repository recognised");
            return Ok(Some(sources));
        }
    }
    Ok(None)
}
