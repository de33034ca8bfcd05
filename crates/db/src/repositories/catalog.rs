use relevon_core::domain::product::{ProductId, ProductProfile, ProductSimilarity};

use super::{CatalogRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCatalogRepository {
    pool: DbPool,
}

impl SqlCatalogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CatalogRepository for SqlCatalogRepository {
    async fn save_profile(&self, profile: &ProductProfile) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO product_profile
                (product_id, category_id, price, rating, popularity, active, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, datetime('now'))
             ON CONFLICT(product_id) DO UPDATE SET
                category_id = excluded.category_id,
                price = excluded.price,
                rating = excluded.rating,
                popularity = excluded.popularity,
                active = excluded.active,
                updated_at = excluded.updated_at",
        )
        .bind(&profile.product_id.0)
        .bind(profile.category_id.as_ref().map(|id| id.0.as_str()))
        .bind(profile.price)
        .bind(profile.rating)
        .bind(profile.popularity)
        .bind(profile.active)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM product_feature WHERE product_id = ?")
            .bind(&profile.product_id.0)
            .execute(&mut *tx)
            .await?;

        for feature in &profile.features {
            sqlx::query(
                "INSERT INTO product_feature (product_id, feature_key, feature_value, weight)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(&profile.product_id.0)
            .bind(&feature.key)
            .bind(feature.value)
            .bind(feature.weight)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn replace_similarities(
        &self,
        product_id: &ProductId,
        pairs: Vec<ProductSimilarity>,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let mut algorithms: Vec<&str> =
            pairs.iter().map(|pair| pair.algorithm.as_str()).collect();
        algorithms.sort_unstable();
        algorithms.dedup();

        for algorithm in algorithms {
            sqlx::query("DELETE FROM product_similarity WHERE product_id = ? AND algorithm = ?")
                .bind(&product_id.0)
                .bind(algorithm)
                .execute(&mut *tx)
                .await?;
        }

        for pair in &pairs {
            let calculation_data = pair
                .calculation_data
                .as_ref()
                .map(|data| data.to_string());

            sqlx::query(
                "INSERT INTO product_similarity
                    (product_id, similar_product_id, algorithm, similarity_score,
                     calculation_data, calculated_at)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(product_id, similar_product_id, algorithm) DO UPDATE SET
                    similarity_score = excluded.similarity_score,
                    calculation_data = excluded.calculation_data,
                    calculated_at = excluded.calculated_at",
            )
            .bind(&product_id.0)
            .bind(&pair.similar_product_id.0)
            .bind(pair.algorithm.as_str())
            .bind(pair.similarity_score)
            .bind(calculation_data)
            .bind(pair.calculated_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
