use course_core::model::{CourseModules, Link, ModuleLessons, Relation};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{db_err, id_from_i64, id_to_i64, ids_to_i64, placeholders, ser, u32_from_i64};
use crate::repository::{LinkRepository, StorageError};

/// Junction table layout for a relation.
///
/// Every junction table has the same shape: `(parent, child, position)` with
/// the pair as primary key.
pub trait RelationTable: Relation {
    const TABLE: &'static str;
    const PARENT_COLUMN: &'static str;
    const CHILD_COLUMN: &'static str;
}

impl RelationTable for CourseModules {
    const TABLE: &'static str = "course_modules";
    const PARENT_COLUMN: &'static str = "course_id";
    const CHILD_COLUMN: &'static str = "module_id";
}

impl RelationTable for ModuleLessons {
    const TABLE: &'static str = "module_lessons";
    const PARENT_COLUMN: &'static str = "module_id";
    const CHILD_COLUMN: &'static str = "lesson_id";
}

fn link_from_row<R: RelationTable>(row: &SqliteRow) -> Result<Link<R>, StorageError> {
    Ok(Link::new(
        id_from_i64::<R::Parent>(row.try_get(R::PARENT_COLUMN).map_err(ser)?)?,
        id_from_i64::<R::Child>(row.try_get(R::CHILD_COLUMN).map_err(ser)?)?,
        u32_from_i64("position", row.try_get("position").map_err(ser)?)?,
    ))
}

#[async_trait::async_trait]
impl<R: RelationTable> LinkRepository<R> for SqliteRepository {
    async fn insert_link(&self, link: &Link<R>) -> Result<(), StorageError> {
        let sql = format!(
            "INSERT INTO {table} ({parent}, {child}, position) VALUES (?1, ?2, ?3)",
            table = R::TABLE,
            parent = R::PARENT_COLUMN,
            child = R::CHILD_COLUMN,
        );

        sqlx::query(&sql)
            .bind(id_to_i64(link.parent)?)
            .bind(id_to_i64(link.child)?)
            .bind(i64::from(link.order))
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        tracing::debug!(
            relation = R::NAME,
            parent = %link.parent,
            child = %link.child,
            order = link.order,
            "inserted link"
        );
        Ok(())
    }

    async fn get_link(
        &self,
        parent: R::Parent,
        child: R::Child,
    ) -> Result<Option<Link<R>>, StorageError> {
        let sql = format!(
            "SELECT {parent}, {child}, position FROM {table} WHERE {parent} = ?1 AND {child} = ?2",
            table = R::TABLE,
            parent = R::PARENT_COLUMN,
            child = R::CHILD_COLUMN,
        );

        let row = sqlx::query(&sql)
            .bind(id_to_i64(parent)?)
            .bind(id_to_i64(child)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(link_from_row::<R>).transpose()
    }

    async fn delete_link(&self, parent: R::Parent, child: R::Child) -> Result<bool, StorageError> {
        let sql = format!(
            "DELETE FROM {table} WHERE {parent} = ?1 AND {child} = ?2",
            table = R::TABLE,
            parent = R::PARENT_COLUMN,
            child = R::CHILD_COLUMN,
        );

        let res = sqlx::query(&sql)
            .bind(id_to_i64(parent)?)
            .bind(id_to_i64(child)?)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        let removed = res.rows_affected() > 0;
        tracing::debug!(relation = R::NAME, %parent, %child, removed, "deleted link");
        Ok(removed)
    }

    async fn children(&self, parent: R::Parent) -> Result<Vec<Link<R>>, StorageError> {
        <Self as LinkRepository<R>>::children_of_many(self, &[parent]).await
    }

    async fn children_of_many(&self, parents: &[R::Parent]) -> Result<Vec<Link<R>>, StorageError> {
        if parents.is_empty() {
            return Ok(Vec::new());
        }

        let parent_ids = ids_to_i64(parents)?;
        let sql = format!(
            "SELECT {parent}, {child}, position FROM {table} WHERE {parent} IN ({list}) \
             ORDER BY {parent} ASC, position ASC, {child} ASC",
            table = R::TABLE,
            parent = R::PARENT_COLUMN,
            child = R::CHILD_COLUMN,
            list = placeholders(1, parent_ids.len()),
        );

        let mut query = sqlx::query(&sql);
        for id in &parent_ids {
            query = query.bind(*id);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(db_err)?;

        let mut links = rows
            .iter()
            .map(link_from_row::<R>)
            .collect::<Result<Vec<_>, _>>()?;

        // Keep the caller's parent order; within a parent the SQL order holds.
        let rank = |p: &R::Parent| parents.iter().position(|q| q == p).unwrap_or(usize::MAX);
        links.sort_by_key(|l| rank(&l.parent));
        Ok(links)
    }

    async fn reorder(
        &self,
        parent: R::Parent,
        orders: &[(R::Child, u32)],
    ) -> Result<(), StorageError> {
        let sql = format!(
            "UPDATE {table} SET position = ?1 WHERE {parent} = ?2 AND {child} = ?3",
            table = R::TABLE,
            parent = R::PARENT_COLUMN,
            child = R::CHILD_COLUMN,
        );
        let parent_id = id_to_i64(parent)?;

        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for (child, order) in orders {
            let res = sqlx::query(&sql)
                .bind(i64::from(*order))
                .bind(parent_id)
                .bind(id_to_i64(*child)?)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;

            if res.rows_affected() == 0 {
                tx.rollback().await.map_err(db_err)?;
                return Err(StorageError::NotFound);
            }
        }

        let count_sql = format!(
            "SELECT COUNT(*) FROM {table} WHERE {parent} = ?1",
            table = R::TABLE,
            parent = R::PARENT_COLUMN,
        );
        let siblings: i64 = sqlx::query_scalar(&count_sql)
            .bind(parent_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;
        if usize::try_from(siblings).ok() != Some(orders.len()) {
            tx.rollback().await.map_err(db_err)?;
            return Err(StorageError::Conflict);
        }
        tx.commit().await.map_err(db_err)?;

        tracing::debug!(relation = R::NAME, %parent, count = orders.len(), "reordered links");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relation_tables_match_relation_names() {
        assert_eq!(<CourseModules as RelationTable>::TABLE, CourseModules::NAME);
        assert_eq!(<ModuleLessons as RelationTable>::TABLE, ModuleLessons::NAME);
    }

    #[test]
    fn parent_and_child_columns_differ() {
        fn check<R: RelationTable>() {
            assert_ne!(R::PARENT_COLUMN, R::CHILD_COLUMN);
        }
        check::<CourseModules>();
        check::<ModuleLessons>();
    }
}
