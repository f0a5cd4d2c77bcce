use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use course_core::model::{Link, Relation};
use storage::repository::{LinkRepository, StorageError};

use crate::error::RelationError;

/// Result of an idempotent link request.
pub enum LinkOutcome<R: Relation> {
    Created(Link<R>),
    /// The pair was already linked; carries the stored link, whose order may
    /// differ from the requested one.
    Existing(Link<R>),
}

impl<R: Relation> LinkOutcome<R> {
    #[must_use]
    pub fn link(&self) -> Link<R> {
        match self {
            LinkOutcome::Created(link) | LinkOutcome::Existing(link) => *link,
        }
    }

    #[must_use]
    pub fn is_created(&self) -> bool {
        matches!(self, LinkOutcome::Created(_))
    }
}

impl<R: Relation> fmt::Debug for LinkOutcome<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkOutcome::Created(link) => f.debug_tuple("Created").field(link).finish(),
            LinkOutcome::Existing(link) => f.debug_tuple("Existing").field(link).finish(),
        }
    }
}

/// Owns the ordered parent → child links of one relation.
pub struct RelationStore<R: Relation> {
    links: Arc<dyn LinkRepository<R>>,
}

impl<R: Relation> Clone for RelationStore<R> {
    fn clone(&self) -> Self {
        Self {
            links: Arc::clone(&self.links),
        }
    }
}

impl<R: Relation> RelationStore<R> {
    #[must_use]
    pub fn new(links: Arc<dyn LinkRepository<R>>) -> Self {
        Self { links }
    }

    /// Link `child` under `parent`. Linking an existing pair returns the
    /// stored link unchanged.
    ///
    /// # Errors
    ///
    /// Returns `RelationError::NotFound` if either endpoint is missing and
    /// `RelationError::Upstream` for other storage failures.
    pub async fn link(
        &self,
        parent: R::Parent,
        child: R::Child,
        order: u32,
    ) -> Result<Link<R>, RelationError> {
        Ok(self.link_with_outcome(parent, child, order).await?.link())
    }

    /// Like [`RelationStore::link`], reporting whether a row was written.
    ///
    /// # Errors
    ///
    /// Returns `RelationError::NotFound` if either endpoint is missing and
    /// `RelationError::Upstream` for other storage failures.
    pub async fn link_with_outcome(
        &self,
        parent: R::Parent,
        child: R::Child,
        order: u32,
    ) -> Result<LinkOutcome<R>, RelationError> {
        let link = Link::new(parent, child, order);
        match self.links.insert_link(&link).await {
            Ok(()) => Ok(LinkOutcome::Created(link)),
            Err(StorageError::Conflict) => {
                if let Some(existing) = self.links.get_link(parent, child).await? {
                    tracing::debug!(
                        relation = R::NAME,
                        %parent,
                        %child,
                        "link already present"
                    );
                    return Ok(LinkOutcome::Existing(existing));
                }
                // Removed between the conflict and the read; the retry settles it.
                match self.links.insert_link(&link).await {
                    Ok(()) => Ok(LinkOutcome::Created(link)),
                    Err(StorageError::Conflict) => {
                        let existing = self
                            .links
                            .get_link(parent, child)
                            .await?
                            .unwrap_or(link);
                        Ok(LinkOutcome::Existing(existing))
                    }
                    Err(err) => Err(err.into()),
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Remove the link if present. Returns whether a link was removed.
    ///
    /// # Errors
    ///
    /// Returns `RelationError::Upstream` on storage failure.
    pub async fn unlink(&self, parent: R::Parent, child: R::Child) -> Result<bool, RelationError> {
        let removed = self.links.delete_link(parent, child).await?;
        if !removed {
            tracing::debug!(relation = R::NAME, %parent, %child, "unlink of absent pair");
        }
        Ok(removed)
    }

    /// Children of `parent` ascending by order.
    ///
    /// # Errors
    ///
    /// Returns `RelationError::Upstream` on storage failure.
    pub async fn list_children(&self, parent: R::Parent) -> Result<Vec<Link<R>>, RelationError> {
        Ok(self.links.children(parent).await?)
    }

    /// Replace the order of the full sibling set: `ordered[i]` gets order `i`.
    ///
    /// # Errors
    ///
    /// Returns `RelationError::Validation` if `ordered` repeats a child or does
    /// not name exactly the current children of `parent`. Nothing is changed
    /// on error.
    pub async fn reorder(
        &self,
        parent: R::Parent,
        ordered: &[R::Child],
    ) -> Result<Vec<Link<R>>, RelationError> {
        let mut requested = HashSet::with_capacity(ordered.len());
        for child in ordered {
            if !requested.insert(*child) {
                return Err(RelationError::Validation(format!(
                    "child {child} listed more than once"
                )));
            }
        }

        let orders = ordered
            .iter()
            .enumerate()
            .map(|(index, child)| {
                u32::try_from(index)
                    .map(|order| (*child, order))
                    .map_err(|_| RelationError::Validation("too many children".into()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        // The storage write checks the sibling set inside its own unit of work.
        self.links
            .reorder(parent, &orders)
            .await
            .map_err(|err| match err {
                StorageError::NotFound | StorageError::Conflict => RelationError::Validation(
                    format!("reorder must list exactly the current children of {parent}"),
                ),
                other => other.into(),
            })?;
        tracing::info!(relation = R::NAME, %parent, count = orders.len(), "reordered children");
        self.list_children(parent).await
    }
}
