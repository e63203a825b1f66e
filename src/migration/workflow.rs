//! Resolving a workflow file into its building blocks.

use crate::cache::RepositoryCache;
use crate::config::{
    Authoring, DestinationConfig, EmptyDiffPolicy, OriginConfig, WorkflowConfig, WorkflowMode,
};
use crate::destination::git::GerritSettings;
use crate::destination::{Destination, FolderDestination, GitDestination};
use crate::error::{Error, Result};
use crate::options::MigrationOptions;
use crate::origin::{FolderOrigin, GitOrigin, Origin};
use crate::review::{GerritClient, ReviewStateReader};
use crate::transform::{Pipeline, Transformation};

/// One origin, one destination, a transformation and the policies binding
/// them.
pub struct Workflow {
    pub name: String,
    pub origin: Box<dyn Origin>,
    pub destination: Box<dyn Destination>,
    pub transformation: Box<dyn Transformation>,
    pub reviews: Option<ReviewStateReader>,
    pub empty_diff: EmptyDiffPolicy,
    pub mode: WorkflowMode,
    pub authoring: Authoring,
}

impl Workflow {
    pub fn new(name: impl Into<String>, origin: Box<dyn Origin>, destination: Box<dyn Destination>) -> Self {
        Self {
            name: name.into(),
            origin,
            destination,
            transformation: Box::new(Pipeline::default()),
            reviews: None,
            empty_diff: EmptyDiffPolicy::default(),
            mode: WorkflowMode::default(),
            authoring: Authoring::default(),
        }
    }

    pub fn with_transformation(mut self, transformation: Box<dyn Transformation>) -> Self {
        self.transformation = transformation;
        self
    }

    pub fn with_reviews(mut self, reviews: ReviewStateReader) -> Self {
        self.reviews = Some(reviews);
        self
    }

    pub fn with_empty_diff(mut self, policy: EmptyDiffPolicy) -> Self {
        self.empty_diff = policy;
        self
    }

    pub fn with_mode(mut self, mode: WorkflowMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_authoring(mut self, authoring: Authoring) -> Self {
        self.authoring = authoring;
        self
    }

    /// Resolve every building block named in `config`.
    ///
    /// Bad patterns and missing review settings are reported here, before a
    /// run starts.
    pub fn from_config(config: &WorkflowConfig, options: &MigrationOptions) -> Result<Self> {
        options.validate()?;
        config.validate()?;

        let cache = RepositoryCache::new(&options.cache_root, options.credentials.clone());

        let origin: Box<dyn Origin> = match &config.origin {
            OriginConfig::Git(git) => Box::new(GitOrigin::new(
                &git.url,
                &git.r#ref,
                cache.clone(),
                options.retry,
            )),
            OriginConfig::Folder(folder) => Box::new(FolderOrigin::new(
                options.resolve_path(&folder.path),
                &folder.author,
                &folder.message,
            )),
        };

        let destination: Box<dyn Destination> = match &config.destination {
            DestinationConfig::Git(git) => {
                let mut destination =
                    GitDestination::new(&git.url, &git.branch, &git.rev_id_label, cache);
                if git.review.is_some() {
                    let review = config.review.as_ref().ok_or_else(|| Error::ConfigParse {
                        message: "Destination pushes for review but no review system is configured"
                            .to_string(),
                        hint: None,
                    })?;
                    destination = destination.with_gerrit(GerritSettings {
                        review_url: review.url.clone(),
                        workflow: config.name.clone(),
                    });
                }
                Box::new(destination)
            }
            DestinationConfig::Folder(folder) => {
                Box::new(FolderDestination::new(options.resolve_path(&folder.path)))
            }
        };

        let mut workflow = Workflow::new(&config.name, origin, destination)
            .with_transformation(Box::new(Pipeline::from_config(&config.transformations)?))
            .with_empty_diff(config.empty_diff)
            .with_mode(config.mode)
            .with_authoring(config.authoring.clone());

        if let Some(review) = &config.review {
            let client = GerritClient::from_env(&review.url)?;
            workflow = workflow.with_reviews(ReviewStateReader::new(Box::new(client), options.retry));
        }
        Ok(workflow)
    }
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("name", &self.name)
            .field("origin", &self.origin.describe())
            .field("destination", &self.destination.describe())
            .field("transformation", &self.transformation.name())
            .field("reviews", &self.reviews.is_some())
            .field("empty_diff", &self.empty_diff)
            .field("mode", &self.mode)
            .field("authoring", &self.authoring)
            .finish()
    }
}
