//! # Catalog Repository
//!
//! Products and warehouses. Catalog prices and costs are denominated in
//! the reference currency; a product's total stock is always derived from
//! its per-warehouse rows, never stored on the product.
//!
//! ## Sales floor
//! The first-created sellable warehouse is the sales floor: order
//! creation, dispatch approval and partial returns all move stock against
//! it.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use bodegon_core::{Money, Product, ValidationError, Warehouse};

use crate::error::{DbError, DbResult};

/// Repository for product and warehouse catalog operations.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Creates a product. Barcodes are unique across the catalog.
    pub async fn create_product(
        &self,
        name: &str,
        barcode: &str,
        description: Option<&str>,
        cost_ref: Money,
        price_ref: Money,
    ) -> DbResult<Product> {
        if name.trim().is_empty() {
            return Err(ValidationError::Required { field: "nombre" }.into());
        }
        if barcode.trim().is_empty() {
            return Err(ValidationError::Required { field: "código de barras" }.into());
        }
        if cost_ref.is_negative() || price_ref.is_negative() {
            return Err(ValidationError::OutOfRange {
                field: "precio",
                value: price_ref.cents().min(cost_ref.cents()),
            }
            .into());
        }

        let now = Utc::now();
        let id = sqlx::query(
            r#"
            INSERT INTO products (name, barcode, description, cost_usd_cents, price_usd_cents, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(name)
        .bind(barcode)
        .bind(description)
        .bind(cost_ref.cents())
        .bind(price_ref.cents())
        .bind(now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        debug!(id, name, "Product created");

        Ok(Product {
            id,
            name: name.to_string(),
            barcode: barcode.to_string(),
            description: description.map(str::to_string),
            cost_usd_cents: cost_ref.cents(),
            price_usd_cents: price_ref.cents(),
            created_at: now,
        })
    }

    /// Gets a product by id.
    pub async fn get_product(&self, id: i64) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, barcode, description, cost_usd_cents, price_usd_cents, created_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Finds a product by its barcode.
    pub async fn find_by_barcode(&self, barcode: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, barcode, description, cost_usd_cents, price_usd_cents, created_at
            FROM products
            WHERE barcode = ?1
            "#,
        )
        .bind(barcode)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Lists all products, newest first.
    pub async fn list_products(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, barcode, description, cost_usd_cents, price_usd_cents, created_at
            FROM products
            ORDER BY id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Updates a product's reference-currency cost and price. Historical
    /// order lines keep their frozen copies; only future sales see the
    /// new values.
    pub async fn update_prices(&self, id: i64, cost_ref: Money, price_ref: Money) -> DbResult<()> {
        if cost_ref.is_negative() || price_ref.is_negative() {
            return Err(ValidationError::OutOfRange {
                field: "precio",
                value: price_ref.cents().min(cost_ref.cents()),
            }
            .into());
        }

        let result = sqlx::query(
            "UPDATE products SET cost_usd_cents = ?2, price_usd_cents = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(cost_ref.cents())
        .bind(price_ref.cents())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Producto", id));
        }

        Ok(())
    }

    // =========================================================================
    // Warehouses
    // =========================================================================

    /// Creates a warehouse.
    pub async fn create_warehouse(&self, name: &str, sellable: bool) -> DbResult<Warehouse> {
        if name.trim().is_empty() {
            return Err(ValidationError::Required { field: "nombre" }.into());
        }

        let now = Utc::now();
        let id = sqlx::query("INSERT INTO warehouses (name, sellable, created_at) VALUES (?1, ?2, ?3)")
            .bind(name)
            .bind(sellable)
            .bind(now)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();

        debug!(id, name, sellable, "Warehouse created");

        Ok(Warehouse {
            id,
            name: name.to_string(),
            sellable,
            created_at: now,
        })
    }

    /// Gets a warehouse by id.
    pub async fn get_warehouse(&self, id: i64) -> DbResult<Option<Warehouse>> {
        let warehouse = sqlx::query_as::<_, Warehouse>(
            "SELECT id, name, sellable, created_at FROM warehouses WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(warehouse)
    }

    /// Lists all warehouses in creation order.
    pub async fn list_warehouses(&self) -> DbResult<Vec<Warehouse>> {
        let warehouses = sqlx::query_as::<_, Warehouse>(
            "SELECT id, name, sellable, created_at FROM warehouses ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(warehouses)
    }

    /// The sales floor: the first-created sellable warehouse.
    pub async fn sales_floor(&self) -> DbResult<Warehouse> {
        let warehouse = sqlx::query_as::<_, Warehouse>(
            "SELECT id, name, sellable, created_at FROM warehouses WHERE sellable = 1 ORDER BY id LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Almacén de venta", "ninguno"))?;

        Ok(warehouse)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
