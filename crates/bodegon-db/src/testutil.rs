//! Shared test fixtures: an in-memory database seeded with the smallest
//! realistic store (one USD rate, two warehouses, two products with
//! stock, a client, a provider and one account of each kind).

use bodegon_core::{Currency, ExchangeRate, Money};

use crate::pool::{Database, DbConfig};

pub(crate) struct Seeded {
    pub db: Database,
    /// Sales floor (first sellable warehouse).
    pub tienda: i64,
    /// Back room (non-sellable).
    pub deposito: i64,
    /// $10.00 price / $6.00 cost, 100 units on the sales floor.
    pub product_a: i64,
    /// $4.00 price / $2.00 cost, 20 units on the sales floor.
    pub product_b: i64,
    pub cliente: i64,
    pub proveedor: i64,
    pub banco_ves: i64,
    pub banco_usd: i64,
    pub punto: i64,
    pub caja: i64,
}

pub(crate) fn admin() -> bodegon_core::Actor {
    bodegon_core::Actor::privileged("gerente")
}

pub(crate) fn cashier() -> bodegon_core::Actor {
    bodegon_core::Actor::employee("cajero1")
}

pub(crate) async fn seed() -> Seeded {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();

    db.rates()
        .upsert_rate(Currency::Usd, ExchangeRate::from_units(40))
        .await
        .unwrap();

    let catalog = db.catalog();
    let tienda = catalog.create_warehouse("Tienda", true).await.unwrap().id;
    let deposito = catalog.create_warehouse("Depósito", false).await.unwrap().id;

    let product_a = catalog
        .create_product(
            "Harina PAN 1kg",
            "7591001000011",
            None,
            Money::from_cents(600),
            Money::from_cents(1_000),
        )
        .await
        .unwrap()
        .id;
    let product_b = catalog
        .create_product(
            "Arroz Primor 1kg",
            "7591001000028",
            None,
            Money::from_cents(200),
            Money::from_cents(400),
        )
        .await
        .unwrap()
        .id;

    // Seed stock through the adjustment path so the movement log stays
    // consistent with the levels from the very first row.
    db.reversals()
        .adjust_inventory(
            tienda,
            &[
                bodegon_core::validation::CountDraft {
                    product_id: product_a,
                    counted_quantity: 100,
                },
                bodegon_core::validation::CountDraft {
                    product_id: product_b,
                    counted_quantity: 20,
                },
            ],
            "inventario inicial",
        )
        .await
        .unwrap();

    let parties = db.parties();
    let cliente = parties
        .create_client("María Pérez", Some("V-12345678"), None)
        .await
        .unwrap()
        .id;
    let proveedor = parties
        .create_provider("Distribuidora Central", None, None)
        .await
        .unwrap()
        .id;

    let accounts = db.accounts();
    let banco_ves = accounts
        .create_bank("Banco de Venezuela", Some("0102-0001"), Currency::Ves)
        .await
        .unwrap()
        .id;
    let banco_usd = accounts
        .create_bank("Banesco Panamá", None, Currency::Usd)
        .await
        .unwrap()
        .id;
    let punto = accounts
        .create_point_of_sale("Punto principal", banco_ves)
        .await
        .unwrap()
        .id;
    let caja = accounts.create_cash_box("Caja principal").await.unwrap().id;

    Seeded {
        db,
        tienda,
        deposito,
        product_a,
        product_b,
        cliente,
        proveedor,
        banco_ves,
        banco_usd,
        punto,
        caja,
    }
}
