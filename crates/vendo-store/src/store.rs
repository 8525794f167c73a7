//! # The Store
//!
//! The authoritative in-process snapshot of catalog, ledger, sales, and
//! service income data, and the sole mutator of that snapshot.
//!
//! ## Mutation Funnel
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Store Operation Shape                           │
//! │                                                                         │
//! │  1. validate against the snapshot (friendly precondition errors)       │
//! │  2. call the ledger service / repository (atomic database write)       │
//! │  3. mirror the returned entities into the snapshot                     │
//! │  4. arm the single-slot undo                                           │
//! │                                                                         │
//! │  A failed write leaves the snapshot untouched: mirroring happens       │
//! │  only after the database commit.                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Operations are synchronous from the caller's perspective: issue a
//! mutation, await it, then read the updated snapshot. There is no
//! background reconciliation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::undo::{LastAction, UndoOutcome};
use vendo_core::metrics::{
    self, CategoryRevenue, DailyRevenue, ProductPerformance, ServicePerformance, TimeWindow,
    TotalMetrics,
};
use vendo_core::validation::{
    validate_name, validate_non_negative_cents, validate_quantity, validate_stock_level,
};
use vendo_core::{
    export, Actor, CoreError, FinanceCategory, FinanceKind, FinanceRecord, Money, Product, Sale,
    Service, ServiceBundle, ServiceIncome, Transaction, TransactionKind, ValidationError,
    DEFAULT_LOW_STOCK_THRESHOLD,
};
use vendo_db::{Database, MonthlyRestockReceipt, RestockTarget, SaleLine, StockReversal};

// =============================================================================
// Inputs
// =============================================================================

/// Fields for a new catalog product.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub cost_cents: i64,
    pub price_cents: i64,
    pub stock_quantity: i64,
    pub low_stock_threshold: Option<i64>,
}

/// Fields for a new service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewService {
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
}

/// One service sold on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleServiceSale {
    pub service_id: String,
    pub customer_name: Option<String>,
    pub payment_method: Option<String>,
    pub tip_cents: Option<i64>,
}

/// Several services sold together with one aggregate discount.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundledServiceSale {
    pub service_ids: Vec<String>,
    pub discount_cents: i64,
    pub customer_name: Option<String>,
    pub payment_method: Option<String>,
    pub tip_cents: Option<i64>,
}

/// A business expense.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewExpense {
    pub amount_cents: i64,
    pub vendor: Option<String>,
    pub category: Option<String>,
    pub payment_method: Option<String>,
}

// =============================================================================
// Load Report
// =============================================================================

/// What the initial load managed to fetch.
///
/// Loading is partial-degradation: a category that fails to load is
/// reported here and left empty, without blocking the others.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub products: usize,
    pub services: usize,
    pub transactions: usize,
    pub sales: usize,
    pub service_incomes: usize,
    /// One entry per category that failed, with the underlying error.
    pub failures: Vec<String>,
}

impl LoadReport {
    /// True when every category loaded.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

// =============================================================================
// Store
// =============================================================================

/// The application state container.
///
/// Constructed once at startup with a database handle and the acting user,
/// then passed by reference to whatever layer needs it - never an ambient
/// global.
#[derive(Debug)]
pub struct Store {
    db: Database,
    actor: Actor,

    products: Vec<Product>,
    services: Vec<Service>,
    /// The ledger, newest first.
    transactions: Vec<Transaction>,
    /// Sale headers with items, newest first.
    sales: Vec<Sale>,
    /// Resolved income rows, newest first.
    service_incomes: Vec<ServiceIncome>,
    last_restock_date: Option<DateTime<Utc>>,

    last_action: Option<LastAction>,
}

impl Store {
    /// Creates an empty store over a database handle. Call [`Store::load`]
    /// to populate the snapshot.
    pub fn new(db: Database, actor: Actor) -> Self {
        Store {
            db,
            actor,
            products: Vec::new(),
            services: Vec::new(),
            transactions: Vec::new(),
            sales: Vec::new(),
            service_incomes: Vec::new(),
            last_restock_date: None,
            last_action: None,
        }
    }

    // -------------------------------------------------------------------------
    // Initial load
    // -------------------------------------------------------------------------

    /// Fetches every category into the snapshot.
    ///
    /// Each category loads independently: a failure is logged, recorded in
    /// the report, and leaves that category empty without blocking the
    /// rest.
    pub async fn load(&mut self) -> LoadReport {
        let mut report = LoadReport::default();

        match self.db.products().list().await {
            Ok(products) => self.products = products,
            Err(e) => {
                warn!(error = %e, "Failed to load products");
                report.failures.push(format!("products: {e}"));
            }
        }

        match self.db.services().list().await {
            Ok(services) => self.services = services,
            Err(e) => {
                warn!(error = %e, "Failed to load services");
                report.failures.push(format!("services: {e}"));
            }
        }

        match self.db.sales().list().await {
            Ok(sales) => self.sales = sales,
            Err(e) => {
                warn!(error = %e, "Failed to load sales");
                report.failures.push(format!("sales: {e}"));
            }
        }

        match self.db.transactions().list().await {
            Ok(transactions) => self.transactions = transactions,
            Err(e) => {
                warn!(error = %e, "Failed to load transactions");
                report.failures.push(format!("transactions: {e}"));
            }
        }

        match self.db.finances().list_income().await {
            Ok(records) => {
                self.service_incomes = records
                    .into_iter()
                    .map(|record| {
                        let service_name = resolve_service_name(&self.services, &record);
                        ServiceIncome {
                            record,
                            service_name,
                        }
                    })
                    .collect();
            }
            Err(e) => {
                warn!(error = %e, "Failed to load service incomes");
                report.failures.push(format!("service incomes: {e}"));
            }
        }

        self.last_restock_date = metrics::latest_restock(&self.transactions);

        report.products = self.products.len();
        report.services = self.services.len();
        report.transactions = self.transactions.len();
        report.sales = self.sales.len();
        report.service_incomes = self.service_incomes.len();

        info!(
            products = report.products,
            services = report.services,
            transactions = report.transactions,
            sales = report.sales,
            service_incomes = report.service_incomes,
            failures = report.failures.len(),
            "Snapshot loaded"
        );

        report
    }

    // -------------------------------------------------------------------------
    // Snapshot accessors
    // -------------------------------------------------------------------------

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn services(&self) -> &[Service] {
        &self.services
    }

    /// Active services only (the set offered for sale).
    pub fn active_services(&self) -> Vec<&Service> {
        self.services.iter().filter(|s| s.active).collect()
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn sales(&self) -> &[Sale] {
        &self.sales
    }

    pub fn service_incomes(&self) -> &[ServiceIncome] {
        &self.service_incomes
    }

    pub fn last_restock_date(&self) -> Option<DateTime<Utc>> {
        self.last_restock_date
    }

    /// Products at or below their low-stock threshold.
    pub fn low_stock_products(&self) -> Vec<&Product> {
        self.products.iter().filter(|p| p.is_low_stock()).collect()
    }

    /// The underlying database handle.
    pub fn database(&self) -> &Database {
        &self.db
    }

    // -------------------------------------------------------------------------
    // Ledger mutations
    // -------------------------------------------------------------------------

    /// Records a sale of one product and mirrors it into the snapshot.
    pub async fn record_sale(&mut self, product_id: &str, quantity: i64) -> StoreResult<Sale> {
        validate_quantity(quantity)?;

        let product = self
            .products
            .iter()
            .find(|p| p.id == product_id)
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;
        if !product.can_sell(quantity) {
            return Err(CoreError::InsufficientStock {
                name: product.name.clone(),
                available: product.stock_quantity,
                requested: quantity,
            }
            .into());
        }
        let prior_stock = product.stock_quantity;

        let receipt = self
            .db
            .ledger()
            .record_sale(product_id, quantity, &self.actor)
            .await
            .map_err(|e| {
                warn!(error = %e, product_id, "Sale failed");
                StoreError::from(e)
            })?;

        if let Some(line) = receipt.sale.items.first() {
            self.last_action = Some(LastAction::Sale(StockReversal {
                transaction_id: line.id.clone(),
                sale_id: Some(receipt.sale.id.clone()),
                product_id: product_id.to_string(),
                prior_stock,
                restore_last_restocked: false,
                prior_last_restocked: None,
            }));
            self.transactions.insert(0, line.clone());
        }

        self.cache_product(receipt.product);
        self.sales.insert(0, receipt.sale.clone());

        Ok(receipt.sale)
    }

    /// Records one checkout of multiple products. Not undoable.
    pub async fn record_bulk_sale(
        &mut self,
        lines: Vec<SaleLine>,
        order_discount_cents: i64,
        payment_method: Option<String>,
        notes: Option<String>,
    ) -> StoreResult<Sale> {
        // Friendly precondition pass over the snapshot before touching the
        // database; the ledger re-checks authoritatively inside its
        // transaction.
        for line in &lines {
            let product = self
                .products
                .iter()
                .find(|p| p.id == line.product_id)
                .ok_or_else(|| CoreError::ProductNotFound(line.product_id.clone()))?;
            if !product.can_sell(line.quantity) {
                return Err(CoreError::InsufficientStock {
                    name: product.name.clone(),
                    available: product.stock_quantity,
                    requested: line.quantity,
                }
                .into());
            }
        }

        let receipt = self
            .db
            .ledger()
            .record_bulk_sale(&lines, order_discount_cents, payment_method, notes, &self.actor)
            .await
            .map_err(|e| {
                warn!(error = %e, lines = lines.len(), "Bulk sale failed");
                StoreError::from(e)
            })?;

        self.last_action = Some(LastAction::NotUndoable {
            action: "bulk sale",
        });

        for product in receipt.products {
            self.cache_product(product);
        }
        for tx in receipt.sale.items.iter().rev() {
            self.transactions.insert(0, tx.clone());
        }
        self.sales.insert(0, receipt.sale.clone());

        Ok(receipt.sale)
    }

    /// Restocks one product.
    pub async fn record_restock(
        &mut self,
        product_id: &str,
        quantity: i64,
    ) -> StoreResult<Transaction> {
        validate_quantity(quantity)?;

        let product = self
            .products
            .iter()
            .find(|p| p.id == product_id)
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;
        let prior_stock = product.stock_quantity;
        let prior_last_restocked = product.last_restocked;

        let receipt = self
            .db
            .ledger()
            .record_restock(product_id, quantity, &self.actor)
            .await
            .map_err(|e| {
                warn!(error = %e, product_id, "Restock failed");
                StoreError::from(e)
            })?;

        self.last_action = Some(LastAction::Restock(StockReversal {
            transaction_id: receipt.transaction.id.clone(),
            sale_id: None,
            product_id: product_id.to_string(),
            prior_stock,
            restore_last_restocked: true,
            prior_last_restocked,
        }));

        self.last_restock_date = Some(receipt.transaction.date);
        self.cache_product(receipt.product);
        self.transactions.insert(0, receipt.transaction.clone());

        Ok(receipt.transaction)
    }

    /// Sets one product's stock to an absolute level.
    pub async fn adjust_inventory(
        &mut self,
        product_id: &str,
        new_quantity: i64,
    ) -> StoreResult<Transaction> {
        validate_stock_level(new_quantity)?;

        let product = self
            .products
            .iter()
            .find(|p| p.id == product_id)
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;
        let prior_stock = product.stock_quantity;

        let receipt = self
            .db
            .ledger()
            .adjust_inventory(product_id, new_quantity, &self.actor)
            .await
            .map_err(|e| {
                warn!(error = %e, product_id, "Adjustment failed");
                StoreError::from(e)
            })?;

        self.last_action = Some(LastAction::Adjustment(StockReversal {
            transaction_id: receipt.transaction.id.clone(),
            sale_id: None,
            product_id: product_id.to_string(),
            prior_stock,
            restore_last_restocked: false,
            prior_last_restocked: None,
        }));

        self.cache_product(receipt.product);
        self.transactions.insert(0, receipt.transaction.clone());

        Ok(receipt.transaction)
    }

    /// Records one monthly restock event across many products. Not
    /// undoable.
    pub async fn record_monthly_restock(
        &mut self,
        targets: Vec<RestockTarget>,
    ) -> StoreResult<MonthlyRestockReceipt> {
        let receipt = self
            .db
            .ledger()
            .record_monthly_restock(&targets, &self.actor)
            .await
            .map_err(|e| {
                warn!(error = %e, targets = targets.len(), "Monthly restock failed");
                StoreError::from(e)
            })?;

        if let Some(parent) = &receipt.parent {
            self.last_action = Some(LastAction::NotUndoable {
                action: "monthly restock",
            });
            self.last_restock_date = Some(parent.date);

            for product in &receipt.products {
                self.cache_product(product.clone());
            }
            for line in receipt.lines.iter().rev() {
                self.transactions.insert(0, line.clone());
            }
            self.transactions.insert(0, parent.clone());
        }

        Ok(receipt)
    }

    /// Returns one sale line: the refund is appended to the ledger and the
    /// stock goes back on the shelf. Not undoable (a return is itself the
    /// correction).
    pub async fn record_return(&mut self, transaction_id: &str) -> StoreResult<Transaction> {
        let receipt = self
            .db
            .ledger()
            .record_return(transaction_id, &self.actor)
            .await
            .map_err(|e| {
                warn!(error = %e, transaction_id, "Return failed");
                StoreError::from(e)
            })?;

        self.last_action = Some(LastAction::NotUndoable { action: "return" });
        self.cache_product(receipt.product);
        self.transactions.insert(0, receipt.transaction.clone());

        Ok(receipt.transaction)
    }

    /// Child lines of an aggregate restock, newest first, from the
    /// snapshot.
    pub fn restock_details(&self, parent_transaction_id: &str) -> Vec<Transaction> {
        self.transactions
            .iter()
            .filter(|tx| {
                matches!(
                    &tx.kind,
                    TransactionKind::RestockLine { parent_id } if parent_id == parent_transaction_id
                )
            })
            .cloned()
            .collect()
    }

    // -------------------------------------------------------------------------
    // Catalog mutations
    // -------------------------------------------------------------------------

    /// Creates a product. Not undoable.
    pub async fn create_product(&mut self, input: NewProduct) -> StoreResult<Product> {
        validate_name("name", &input.name)?;
        validate_non_negative_cents("cost", input.cost_cents)?;
        validate_non_negative_cents("price", input.price_cents)?;
        validate_stock_level(input.stock_quantity)?;

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            description: input.description,
            category: input.category,
            cost_cents: input.cost_cents,
            price_cents: input.price_cents,
            stock_quantity: input.stock_quantity,
            low_stock_threshold: input
                .low_stock_threshold
                .unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD),
            last_restocked: None,
            created_at: now,
            updated_at: now,
        };

        self.db.products().insert(&product).await?;

        self.last_action = Some(LastAction::NotUndoable {
            action: "product create",
        });
        self.cache_product(product.clone());

        info!(id = %product.id, name = %product.name, "Product created");
        Ok(product)
    }

    /// Updates a product's catalog fields. Undoable.
    pub async fn update_product(&mut self, mut updated: Product) -> StoreResult<Product> {
        validate_name("name", &updated.name)?;
        validate_non_negative_cents("cost", updated.cost_cents)?;
        validate_non_negative_cents("price", updated.price_cents)?;
        validate_stock_level(updated.stock_quantity)?;

        let previous = self
            .products
            .iter()
            .find(|p| p.id == updated.id)
            .cloned()
            .ok_or_else(|| CoreError::ProductNotFound(updated.id.clone()))?;

        self.db.products().update(&updated).await?;
        updated.updated_at = Utc::now();

        self.last_action = Some(LastAction::ProductUpdate { previous });
        self.cache_product(updated.clone());

        info!(id = %updated.id, "Product updated");
        Ok(updated)
    }

    /// Deletes a product. Undoable; the ledger keeps its name snapshots.
    pub async fn delete_product(&mut self, product_id: &str) -> StoreResult<()> {
        let previous = self
            .products
            .iter()
            .find(|p| p.id == product_id)
            .cloned()
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

        self.db.products().delete(product_id).await?;

        self.last_action = Some(LastAction::ProductDelete { previous });
        self.products.retain(|p| p.id != product_id);

        info!(id = %product_id, "Product deleted");
        Ok(())
    }

    /// Creates a service. Not undoable.
    pub async fn create_service(&mut self, input: NewService) -> StoreResult<Service> {
        validate_name("name", &input.name)?;
        validate_non_negative_cents("price", input.price_cents)?;

        let service = Service {
            id: Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            description: input.description,
            price_cents: input.price_cents,
            active: true,
            created_at: Utc::now(),
        };

        self.db.services().insert(&service).await?;

        self.last_action = Some(LastAction::NotUndoable {
            action: "service create",
        });
        self.cache_service(service.clone());

        info!(id = %service.id, name = %service.name, "Service created");
        Ok(service)
    }

    /// Updates a service. Not undoable.
    pub async fn update_service(&mut self, updated: Service) -> StoreResult<Service> {
        validate_name("name", &updated.name)?;
        validate_non_negative_cents("price", updated.price_cents)?;

        if !self.services.iter().any(|s| s.id == updated.id) {
            return Err(CoreError::ServiceNotFound(updated.id.clone()).into());
        }

        self.db.services().update(&updated).await?;

        self.last_action = Some(LastAction::NotUndoable {
            action: "service update",
        });
        self.cache_service(updated.clone());

        info!(id = %updated.id, "Service updated");
        Ok(updated)
    }

    /// Soft-deletes a service: hidden from sale, kept for history. Not
    /// undoable.
    pub async fn deactivate_service(&mut self, service_id: &str) -> StoreResult<()> {
        let mut service = self
            .services
            .iter()
            .find(|s| s.id == service_id)
            .cloned()
            .ok_or_else(|| CoreError::ServiceNotFound(service_id.to_string()))?;

        self.db.services().soft_delete(service_id).await?;

        service.active = false;
        self.last_action = Some(LastAction::NotUndoable {
            action: "service delete",
        });
        self.cache_service(service);

        info!(id = %service_id, "Service deactivated");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Finance mutations
    // -------------------------------------------------------------------------

    /// Records income for one service sold on its own. Not undoable.
    pub async fn record_service_income(
        &mut self,
        input: SingleServiceSale,
    ) -> StoreResult<ServiceIncome> {
        validate_non_negative_cents("tip", input.tip_cents.unwrap_or(0))?;

        let service = self
            .services
            .iter()
            .find(|s| s.id == input.service_id && s.active)
            .ok_or_else(|| CoreError::ServiceNotFound(input.service_id.clone()))?;
        let (service_id, service_name, price_cents) =
            (service.id.clone(), service.name.clone(), service.price_cents);

        let record = FinanceRecord {
            id: Uuid::new_v4().to_string(),
            kind: FinanceKind::Income,
            date: Utc::now(),
            amount_cents: price_cents,
            customer_name: input.customer_name,
            service_id: Some(service_id),
            payment_method: input.payment_method,
            tip_cents: input.tip_cents,
            vendor: None,
            category: FinanceCategory::Plain { name: None },
        };

        self.db.finances().insert(&record).await?;

        let income = ServiceIncome {
            record,
            service_name,
        };
        self.last_action = Some(LastAction::NotUndoable {
            action: "service income",
        });
        self.service_incomes.insert(0, income.clone());

        info!(service = %income.service_name, amount = %income.record.amount_cents, "Service income recorded");
        Ok(income)
    }

    /// Records income for several services sold together, denormalized
    /// into one finance row carrying a bundle descriptor. Not undoable.
    pub async fn record_bundled_service_income(
        &mut self,
        input: BundledServiceSale,
    ) -> StoreResult<ServiceIncome> {
        if input.service_ids.is_empty() {
            return Err(ValidationError::Required {
                field: "services".to_string(),
            }
            .into());
        }
        validate_non_negative_cents("discount", input.discount_cents)?;
        validate_non_negative_cents("tip", input.tip_cents.unwrap_or(0))?;

        let mut names = Vec::with_capacity(input.service_ids.len());
        let mut prices = Vec::with_capacity(input.service_ids.len());
        for service_id in &input.service_ids {
            let service = self
                .services
                .iter()
                .find(|s| &s.id == service_id && s.active)
                .ok_or_else(|| CoreError::ServiceNotFound(service_id.clone()))?;
            names.push(service.name.clone());
            prices.push(service.price_cents);
        }

        let bundle = ServiceBundle {
            service_ids: input.service_ids.clone(),
            service_names: names.clone(),
            service_prices_cents: prices,
            discount_cents: input.discount_cents,
        };
        let total = bundle
            .subtotal()
            .saturating_sub_to_zero(Money::from_cents(input.discount_cents));

        let record = FinanceRecord {
            id: Uuid::new_v4().to_string(),
            kind: FinanceKind::Income,
            date: Utc::now(),
            amount_cents: total.cents(),
            customer_name: input.customer_name,
            // The schema holds one service id per row; the first member
            // stands in and the bundle descriptor carries the rest.
            service_id: input.service_ids.first().cloned(),
            payment_method: input.payment_method,
            tip_cents: input.tip_cents,
            vendor: None,
            category: FinanceCategory::Bundle { bundle },
        };

        self.db.finances().insert(&record).await?;

        let income = ServiceIncome {
            record,
            service_name: names.join(" + "),
        };
        self.last_action = Some(LastAction::NotUndoable {
            action: "service income",
        });
        self.service_incomes.insert(0, income.clone());

        info!(services = %income.service_name, amount = %income.record.amount_cents, "Bundled service income recorded");
        Ok(income)
    }

    /// Records a business expense. Not undoable.
    pub async fn record_expense(&mut self, input: NewExpense) -> StoreResult<FinanceRecord> {
        if input.amount_cents <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "amount".to_string(),
            }
            .into());
        }

        let record = FinanceRecord {
            id: Uuid::new_v4().to_string(),
            kind: FinanceKind::Expense,
            date: Utc::now(),
            amount_cents: input.amount_cents,
            customer_name: None,
            service_id: None,
            payment_method: input.payment_method,
            tip_cents: None,
            vendor: input.vendor,
            category: FinanceCategory::Plain {
                name: input.category,
            },
        };

        self.db.finances().insert(&record).await?;

        self.last_action = Some(LastAction::NotUndoable { action: "expense" });

        info!(amount = %record.amount_cents, "Expense recorded");
        Ok(record)
    }

    // -------------------------------------------------------------------------
    // Undo
    // -------------------------------------------------------------------------

    /// Reverses exactly the most recent recorded action.
    ///
    /// One slot, one level: a second undo without an intervening action
    /// answers `NothingToUndo`. Actions outside the undoable set answer
    /// `CannotUndo` and stay in the slot. Both refusals are benign
    /// outcomes, not errors.
    pub async fn undo_last(&mut self) -> StoreResult<UndoOutcome> {
        let Some(action) = self.last_action.take() else {
            info!("Undo requested with empty slot");
            return Ok(UndoOutcome::NothingToUndo);
        };

        if let LastAction::NotUndoable { action: name } = &action {
            let name = name.to_string();
            info!(action = %name, "Last action cannot be undone");
            self.last_action = Some(action);
            return Ok(UndoOutcome::CannotUndo { action: name });
        }

        let label = action.label();
        let result = match &action {
            LastAction::Sale(reversal) => self.revert_stock_action(reversal, false).await,
            LastAction::Restock(reversal) => self.revert_stock_action(reversal, true).await,
            LastAction::Adjustment(reversal) => self.revert_stock_action(reversal, false).await,
            LastAction::ProductUpdate { previous } => {
                let previous = previous.clone();
                match self.db.products().update(&previous).await {
                    Ok(()) => {
                        self.cache_product(previous);
                        Ok(())
                    }
                    Err(e) => Err(StoreError::from(e)),
                }
            }
            LastAction::ProductDelete { previous } => {
                let previous = previous.clone();
                match self.db.products().insert(&previous).await {
                    Ok(()) => {
                        self.cache_product(previous);
                        Ok(())
                    }
                    Err(e) => Err(StoreError::from(e)),
                }
            }
            LastAction::NotUndoable { .. } => unreachable!("handled above"),
        };

        match result {
            Ok(()) => {
                info!(action = %label, "Last action undone");
                Ok(UndoOutcome::Undone {
                    description: format!("Reverted last {label}"),
                })
            }
            Err(e) => {
                // The action was not reversed; keep it in the slot so the
                // user can retry.
                warn!(action = %label, error = %e, "Undo failed");
                self.last_action = Some(action);
                Err(e)
            }
        }
    }

    /// Shared reversal path for sale / restock / adjustment undo.
    async fn revert_stock_action(
        &mut self,
        reversal: &StockReversal,
        recompute_restock_date: bool,
    ) -> StoreResult<()> {
        let product = self.db.ledger().revert(reversal).await?;

        self.transactions
            .retain(|tx| tx.id != reversal.transaction_id);
        if let Some(sale_id) = &reversal.sale_id {
            self.sales.retain(|sale| sale.id != *sale_id);
        }
        self.cache_product(product);
        if recompute_restock_date {
            self.last_restock_date = metrics::latest_restock(&self.transactions);
        }

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Metrics over the snapshot
    // -------------------------------------------------------------------------

    pub fn product_performance(&self, window: TimeWindow) -> Vec<ProductPerformance> {
        metrics::product_performance(&self.transactions, &self.products, window, Utc::now())
    }

    pub fn sales_by_day(&self, window: TimeWindow) -> Vec<DailyRevenue> {
        metrics::sales_by_day(&self.sales, window, Utc::now())
    }

    pub fn category_revenue(&self, window: TimeWindow) -> Vec<CategoryRevenue> {
        metrics::category_revenue(&self.transactions, &self.products, window, Utc::now())
    }

    pub fn service_performance(&self, window: TimeWindow) -> Vec<ServicePerformance> {
        metrics::service_performance(&self.service_incomes, window, Utc::now())
    }

    pub fn total_metrics(&self, window: TimeWindow) -> TotalMetrics {
        metrics::total_metrics(
            &self.transactions,
            &self.service_incomes,
            window,
            Utc::now(),
        )
    }

    /// Product performance as downloadable CSV.
    pub fn export_product_performance(&self, window: TimeWindow) -> String {
        export::product_performance_csv(&self.product_performance(window))
    }

    /// Service performance as downloadable CSV.
    pub fn export_service_performance(&self, window: TimeWindow) -> String {
        export::service_performance_csv(&self.service_performance(window))
    }

    // -------------------------------------------------------------------------
    // Cache maintenance
    // -------------------------------------------------------------------------

    /// Replaces (or inserts) a product in the snapshot, keeping name order.
    fn cache_product(&mut self, product: Product) {
        match self.products.iter_mut().find(|p| p.id == product.id) {
            Some(slot) => *slot = product,
            None => {
                self.products.push(product);
                self.products.sort_by(|a, b| a.name.cmp(&b.name));
            }
        }
    }

    /// Replaces (or inserts) a service in the snapshot, keeping name order.
    fn cache_service(&mut self, service: Service) {
        match self.services.iter_mut().find(|s| s.id == service.id) {
            Some(slot) => *slot = service,
            None => {
                self.services.push(service);
                self.services.sort_by(|a, b| a.name.cmp(&b.name));
            }
        }
    }
}

/// Resolves the display name of an income row: the service catalog first,
/// then the bundle's own names, then the plain category, then a fallback.
fn resolve_service_name(services: &[Service], record: &FinanceRecord) -> String {
    if let Some(bundle) = record.category.bundle() {
        return bundle.service_names.join(" + ");
    }
    if let Some(service_id) = &record.service_id {
        if let Some(service) = services.iter().find(|s| &s.id == service_id) {
            return service.name.clone();
        }
    }
    if let FinanceCategory::Plain { name: Some(name) } = &record.category {
        return name.clone();
    }
    "Unknown service".to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use vendo_db::DbConfig;

    async fn empty_store() -> Store {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        Store::new(db, Actor::new("u1", "Ana"))
    }

    fn new_product(name: &str, stock: i64, cost: i64, price: i64) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            description: None,
            category: "Parts".to_string(),
            cost_cents: cost,
            price_cents: price,
            stock_quantity: stock,
            low_stock_threshold: None,
        }
    }

    async fn store_with_product(stock: i64, cost: i64, price: i64) -> (Store, String) {
        let mut store = empty_store().await;
        let product = store
            .create_product(new_product("Product A", stock, cost, price))
            .await
            .unwrap();
        (store, product.id)
    }

    #[tokio::test]
    async fn test_load_populates_snapshot() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        // Seed through a first store, then load a fresh one.
        let mut writer = Store::new(db.clone(), Actor::new("u1", "Ana"));
        let product = writer
            .create_product(new_product("Product A", 10, 800, 2000))
            .await
            .unwrap();
        writer.record_sale(&product.id, 2).await.unwrap();
        writer
            .create_service(NewService {
                name: "Oil Change".to_string(),
                description: None,
                price_cents: 4500,
            })
            .await
            .unwrap();

        let mut store = Store::new(db, Actor::new("u2", "Ben"));
        let report = store.load().await;

        assert!(report.is_complete());
        assert_eq!(report.products, 1);
        assert_eq!(report.services, 1);
        assert_eq!(report.transactions, 1);
        assert_eq!(report.sales, 1);
        assert_eq!(store.sales()[0].items.len(), 1);
        assert_eq!(store.products()[0].stock_quantity, 8);
    }

    #[tokio::test]
    async fn test_record_sale_mirrors_snapshot() {
        let (mut store, product_id) = store_with_product(10, 800, 2000).await;

        let sale = store.record_sale(&product_id, 3).await.unwrap();

        assert_eq!(sale.total_cents, 6000);
        assert_eq!(store.products()[0].stock_quantity, 7);
        assert_eq!(store.transactions().len(), 1);
        assert_eq!(store.sales().len(), 1);

        // The database agrees with the snapshot.
        let stored = store
            .database()
            .products()
            .get_by_id(&product_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.stock_quantity, 7);
    }

    #[tokio::test]
    async fn test_record_sale_insufficient_stock_leaves_snapshot_alone() {
        let (mut store, product_id) = store_with_product(2, 800, 2000).await;

        let err = store.record_sale(&product_id, 5).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Core(CoreError::InsufficientStock { .. })
        ));

        assert_eq!(store.products()[0].stock_quantity, 2);
        assert!(store.transactions().is_empty());
        assert!(store.sales().is_empty());
    }

    /// Undo twice in a row: the second call is a no-op and deletes nothing.
    #[tokio::test]
    async fn test_undo_sale_then_nothing_to_undo() {
        let (mut store, product_id) = store_with_product(10, 800, 2000).await;
        store.record_sale(&product_id, 3).await.unwrap();

        let first = store.undo_last().await.unwrap();
        assert!(matches!(first, UndoOutcome::Undone { .. }));
        assert_eq!(store.products()[0].stock_quantity, 10);
        assert!(store.transactions().is_empty());
        assert!(store.sales().is_empty());
        assert_eq!(
            store
                .database()
                .transactions()
                .count()
                .await
                .unwrap(),
            0
        );

        let second = store.undo_last().await.unwrap();
        assert_eq!(second, UndoOutcome::NothingToUndo);
        assert_eq!(
            store
                .database()
                .transactions()
                .count()
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_bulk_sale_is_not_undoable() {
        let mut store = empty_store().await;
        let a = store
            .create_product(new_product("Product A", 10, 800, 2000))
            .await
            .unwrap();
        let b = store
            .create_product(new_product("Product B", 5, 300, 1000))
            .await
            .unwrap();

        let lines = vec![
            SaleLine {
                product_id: a.id.clone(),
                quantity: 2,
                discount_cents: 500,
            },
            SaleLine {
                product_id: b.id.clone(),
                quantity: 1,
                discount_cents: 0,
            },
        ];
        let sale = store
            .record_bulk_sale(lines, 0, Some("cash".to_string()), None)
            .await
            .unwrap();

        assert_eq!(sale.total_cents, 4500);
        assert_eq!(store.transactions().len(), 2);

        let outcome = store.undo_last().await.unwrap();
        assert_eq!(
            outcome,
            UndoOutcome::CannotUndo {
                action: "bulk sale".to_string()
            }
        );
        // Nothing was deleted by the refusal.
        assert_eq!(store.transactions().len(), 2);
        assert_eq!(store.sales().len(), 1);
    }

    #[tokio::test]
    async fn test_return_restocks_and_is_not_undoable() {
        let (mut store, product_id) = store_with_product(10, 800, 2000).await;
        let sale = store.record_sale(&product_id, 3).await.unwrap();
        assert_eq!(store.products()[0].stock_quantity, 7);

        let tx = store.record_return(&sale.items[0].id).await.unwrap();
        assert_eq!(tx.quantity, 3);
        assert_eq!(store.products()[0].stock_quantity, 10);
        assert_eq!(store.transactions().len(), 2);

        let outcome = store.undo_last().await.unwrap();
        assert_eq!(
            outcome,
            UndoOutcome::CannotUndo {
                action: "return".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_restock_stamps_and_undo_restores() {
        let (mut store, product_id) = store_with_product(2, 500, 900).await;
        assert_eq!(store.last_restock_date(), None);

        let tx = store.record_restock(&product_id, 10).await.unwrap();
        assert_eq!(tx.amount_cents, 5000);
        assert_eq!(store.products()[0].stock_quantity, 12);
        assert_eq!(store.last_restock_date(), Some(tx.date));

        let outcome = store.undo_last().await.unwrap();
        assert!(matches!(outcome, UndoOutcome::Undone { .. }));
        assert_eq!(store.products()[0].stock_quantity, 2);
        assert_eq!(store.products()[0].last_restocked, None);
        assert_eq!(store.last_restock_date(), None);
    }

    #[tokio::test]
    async fn test_adjustment_and_undo() {
        let (mut store, product_id) = store_with_product(10, 500, 900).await;

        let tx = store.adjust_inventory(&product_id, 4).await.unwrap();
        assert_eq!(tx.quantity, 6);
        assert_eq!(tx.amount_cents, 0);
        assert_eq!(store.products()[0].stock_quantity, 4);

        store.undo_last().await.unwrap();
        assert_eq!(store.products()[0].stock_quantity, 10);
        assert!(store.transactions().is_empty());
    }

    #[tokio::test]
    async fn test_product_update_undo_restores_previous() {
        let (mut store, product_id) = store_with_product(10, 500, 900).await;

        let mut updated = store.products()[0].clone();
        updated.price_cents = 1500;
        store.update_product(updated).await.unwrap();
        assert_eq!(store.products()[0].price_cents, 1500);

        let outcome = store.undo_last().await.unwrap();
        assert!(matches!(outcome, UndoOutcome::Undone { .. }));
        assert_eq!(store.products()[0].price_cents, 900);

        let stored = store
            .database()
            .products()
            .get_by_id(&product_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.price_cents, 900);
    }

    #[tokio::test]
    async fn test_product_delete_undo_reinserts() {
        let (mut store, product_id) = store_with_product(10, 500, 900).await;

        store.delete_product(&product_id).await.unwrap();
        assert!(store.products().is_empty());

        let outcome = store.undo_last().await.unwrap();
        assert!(matches!(outcome, UndoOutcome::Undone { .. }));
        assert_eq!(store.products().len(), 1);
        assert_eq!(store.products()[0].id, product_id);
        assert!(store
            .database()
            .products()
            .get_by_id(&product_id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_monthly_restock_mirrors_parent_and_lines() {
        let mut store = empty_store().await;
        let x = store
            .create_product(new_product("Product X", 2, 500, 900))
            .await
            .unwrap();
        let y = store
            .create_product(new_product("Product Y", 8, 300, 700))
            .await
            .unwrap();

        let receipt = store
            .record_monthly_restock(vec![
                RestockTarget {
                    product_id: x.id.clone(),
                    new_quantity: 10,
                },
                RestockTarget {
                    product_id: y.id.clone(),
                    new_quantity: 5,
                },
            ])
            .await
            .unwrap();

        let parent = receipt.parent.unwrap();
        assert_eq!(receipt.total_cost_cents, 4000);

        // Parent first, then its line, newest first in the snapshot.
        assert_eq!(store.transactions()[0].id, parent.id);
        assert_eq!(store.transactions().len(), 2);
        assert_eq!(store.restock_details(&parent.id).len(), 1);
        assert_eq!(store.last_restock_date(), Some(parent.date));

        let x_cached = store
            .products()
            .iter()
            .find(|p| p.id == x.id)
            .unwrap();
        assert_eq!(x_cached.stock_quantity, 10);

        let outcome = store.undo_last().await.unwrap();
        assert_eq!(
            outcome,
            UndoOutcome::CannotUndo {
                action: "monthly restock".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_service_income_single_and_bundled() {
        let mut store = empty_store().await;
        let wash = store
            .create_service(NewService {
                name: "Wash".to_string(),
                description: None,
                price_cents: 3000,
            })
            .await
            .unwrap();
        let wax = store
            .create_service(NewService {
                name: "Wax".to_string(),
                description: None,
                price_cents: 7000,
            })
            .await
            .unwrap();

        store
            .record_service_income(SingleServiceSale {
                service_id: wash.id.clone(),
                customer_name: Some("Maria".to_string()),
                payment_method: Some("cash".to_string()),
                tip_cents: Some(500),
            })
            .await
            .unwrap();

        let bundled = store
            .record_bundled_service_income(BundledServiceSale {
                service_ids: vec![wash.id.clone(), wax.id.clone()],
                discount_cents: 1000,
                customer_name: Some("Jo".to_string()),
                payment_method: None,
                tip_cents: None,
            })
            .await
            .unwrap();

        assert_eq!(bundled.record.amount_cents, 9000);
        assert_eq!(bundled.service_name, "Wash + Wax");
        assert!(bundled.record.category.bundle().is_some());
        assert_eq!(store.service_incomes().len(), 2);

        // Bundle expansion in the metrics: Wash gets 3000 (single) plus
        // its discounted bundle share 2700.
        let perf = store.service_performance(TimeWindow::Week);
        let wash_row = perf.iter().find(|r| r.name == "Wash").unwrap();
        let wax_row = perf.iter().find(|r| r.name == "Wax").unwrap();
        assert_eq!(wash_row.revenue_cents, 5700);
        assert_eq!(wash_row.occurrences, 2);
        assert_eq!(wash_row.unique_customers, 2);
        assert_eq!(wax_row.revenue_cents, 6300);
    }

    #[tokio::test]
    async fn test_inactive_service_is_hidden_from_sale() {
        let mut store = empty_store().await;
        let service = store
            .create_service(NewService {
                name: "Wash".to_string(),
                description: None,
                price_cents: 3000,
            })
            .await
            .unwrap();

        store.deactivate_service(&service.id).await.unwrap();
        assert!(store.active_services().is_empty());
        assert_eq!(store.services().len(), 1);

        let err = store
            .record_service_income(SingleServiceSale {
                service_id: service.id.clone(),
                customer_name: None,
                payment_method: None,
                tip_cents: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Core(CoreError::ServiceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_metrics_and_export_over_snapshot() {
        let (mut store, product_id) = store_with_product(10, 800, 2000).await;
        store.record_sale(&product_id, 3).await.unwrap();

        let perf = store.product_performance(TimeWindow::Week);
        assert_eq!(perf.len(), 1);
        assert_eq!(perf[0].total_sold, 3);
        assert_eq!(perf[0].revenue_cents, 6000);
        assert_eq!(perf[0].profit_cents, 3600);

        let csv = store.export_product_performance(TimeWindow::Week);
        assert_eq!(csv.lines().count(), 2);
        assert!(csv.lines().nth(1).unwrap().contains("60.00"));

        let days = store.sales_by_day(TimeWindow::Week);
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].revenue_cents, 6000);

        let totals = store.total_metrics(TimeWindow::Week);
        assert_eq!(totals.sale_count, 1);
        assert_eq!(totals.sales_revenue_cents, 6000);
    }

    #[tokio::test]
    async fn test_create_product_validation() {
        let mut store = empty_store().await;

        let err = store
            .create_product(new_product("", 10, 500, 900))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Core(CoreError::Validation(ValidationError::Required { .. }))
        ));

        let err = store
            .create_product(new_product("Negative", -1, 500, 900))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Core(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_low_stock_listing() {
        let mut store = empty_store().await;
        store
            .create_product(NewProduct {
                low_stock_threshold: Some(5),
                ..new_product("Scarce", 3, 100, 200)
            })
            .await
            .unwrap();
        store
            .create_product(NewProduct {
                low_stock_threshold: Some(5),
                ..new_product("Plenty", 50, 100, 200)
            })
            .await
            .unwrap();

        let low = store.low_stock_products();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].name, "Scarce");
    }
}
