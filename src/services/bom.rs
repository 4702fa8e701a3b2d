//! Bill-of-materials: recipe maintenance and one-level requirement expansion.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, SqlErr,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::entities::recipe_component::{self, Entity as RecipeComponentEntity};
use crate::errors::ServiceError;
use crate::units::UnitOfMeasure;

/// One line of an expanded requirements list: reserve this much of this
/// component, in its declared unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentRequirement {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub unit: UnitOfMeasure,
}

/// Service for recipe maintenance and expansion.
#[derive(Clone)]
pub struct BomService {
    db: Arc<DatabaseConnection>,
}

impl BomService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Declares that one unit of `product_id` consumes `quantity_per_unit` of
    /// `component_product_id`. A product cannot be its own component.
    #[instrument(skip(self))]
    pub async fn add_component(
        &self,
        tenant_id: Uuid,
        product_id: Uuid,
        component_product_id: Uuid,
        quantity_per_unit: Decimal,
        unit: UnitOfMeasure,
    ) -> Result<recipe_component::Model, ServiceError> {
        if product_id == component_product_id {
            return Err(ServiceError::InvalidArgument(
                "a product cannot be a component of itself".to_string(),
            ));
        }
        if quantity_per_unit <= Decimal::ZERO {
            return Err(ServiceError::InvalidArgument(format!(
                "component quantity per unit must be positive, got {quantity_per_unit}"
            )));
        }

        let now = Utc::now();
        let created = recipe_component::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(tenant_id),
            product_id: Set(product_id),
            component_product_id: Set(component_product_id),
            quantity_per_unit: Set(quantity_per_unit),
            unit: Set(unit.as_str().to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .map_err(|err| match err.sql_err() {
            // (tenant, product, component) unique index
            Some(SqlErr::UniqueConstraintViolation(_)) => ServiceError::InvalidArgument(format!(
                "component {component_product_id} already declared for product {product_id}"
            )),
            _ => ServiceError::Database(err),
        })?;

        info!(
            product_id = %product_id,
            component_product_id = %component_product_id,
            quantity_per_unit = %quantity_per_unit,
            "recipe component added"
        );
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn remove_component(
        &self,
        tenant_id: Uuid,
        product_id: Uuid,
        component_product_id: Uuid,
    ) -> Result<(), ServiceError> {
        let result = RecipeComponentEntity::delete_many()
            .filter(recipe_component::Column::TenantId.eq(tenant_id))
            .filter(recipe_component::Column::ProductId.eq(product_id))
            .filter(recipe_component::Column::ComponentProductId.eq(component_product_id))
            .exec(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "no recipe component {component_product_id} for product {product_id}"
            )));
        }
        Ok(())
    }

    pub async fn components_for(
        &self,
        tenant_id: Uuid,
        product_id: Uuid,
    ) -> Result<Vec<recipe_component::Model>, ServiceError> {
        RecipeComponentEntity::find()
            .filter(recipe_component::Column::TenantId.eq(tenant_id))
            .filter(recipe_component::Column::ProductId.eq(product_id))
            .order_by_asc(recipe_component::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Expands a finished product into its flat component requirements, one
    /// level deep. A product with no recipe is a directly-stocked item and
    /// expands to itself with the fallback unit. No unit conversion happens
    /// here; each component keeps its declared unit.
    #[instrument(skip(self))]
    pub async fn expand_requirements(
        &self,
        product_id: Uuid,
        product_quantity: Decimal,
        fallback_unit: UnitOfMeasure,
        tenant_id: Uuid,
    ) -> Result<Vec<ComponentRequirement>, ServiceError> {
        let components = self.components_for(tenant_id, product_id).await?;

        if components.is_empty() {
            return Ok(vec![ComponentRequirement {
                product_id,
                quantity: product_quantity,
                unit: fallback_unit,
            }]);
        }

        components
            .into_iter()
            .map(|line| {
                let unit = UnitOfMeasure::from_str(&line.unit).ok_or_else(|| {
                    ServiceError::Internal(format!(
                        "recipe component {} carries unknown unit {:?}",
                        line.id, line.unit
                    ))
                })?;
                Ok(ComponentRequirement {
                    product_id: line.component_product_id,
                    quantity: line.quantity_per_unit * product_quantity,
                    unit,
                })
            })
            .collect()
    }
}
