//! Inventory record and its ledger arithmetic.

use chrono::{DateTime, Utc};
use common::{Money, ProductId, RecordId};
use document_store::Document;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::InventoryError;

pub const DEFAULT_REORDER_POINT: u32 = 10;
pub const DEFAULT_MAX_STOCK: u32 = 1000;

/// Generates an inventory id: `INV-<yyyymmdd>-<8 random chars>`.
pub fn generate_inventory_id(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    format!("INV-{}-{}", now.format("%Y%m%d"), suffix)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InventoryStatus {
    #[default]
    Active,
    Inactive,
    Discontinued,
    OutOfStock,
}

impl InventoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InventoryStatus::Active => "active",
            InventoryStatus::Inactive => "inactive",
            InventoryStatus::Discontinued => "discontinued",
            InventoryStatus::OutOfStock => "out_of_stock",
        }
    }
}

impl std::fmt::Display for InventoryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for InventoryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(InventoryStatus::Active),
            "inactive" => Ok(InventoryStatus::Inactive),
            "discontinued" => Ok(InventoryStatus::Discontinued),
            "out_of_stock" => Ok(InventoryStatus::OutOfStock),
            other => Err(format!("unknown inventory status: {other}")),
        }
    }
}

/// Where stock is held.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: String,
    pub name: String,
    pub location: String,
}

impl Warehouse {
    pub const DEFAULT_ID: &'static str = "MAIN";
}

impl Default for Warehouse {
    fn default() -> Self {
        Self {
            id: Self::DEFAULT_ID.to_string(),
            name: "Main Warehouse".to_string(),
            location: "Default Location".to_string(),
        }
    }
}

/// Unit and total stock cost. `total_cost` is derived on save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockCost {
    pub unit_cost: Money,
    pub total_cost: Money,
    pub currency: String,
}

/// Input for a new inventory record.
#[derive(Debug, Clone, Default)]
pub struct NewInventoryItem {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub quantity: u32,
    pub reorder_point: Option<u32>,
    pub max_stock: Option<u32>,
    pub warehouse: Option<Warehouse>,
    pub unit_cost: Money,
    pub currency: Option<String>,
    pub notes: Option<String>,
}

/// Stock of one product in one warehouse.
///
/// `available_quantity`, the low/out-of-stock flags and `cost.total_cost`
/// are derived and recomputed before every write. The ledger operations
/// keep `reserved_quantity <= quantity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRecord {
    id: RecordId,
    inventory_id: String,
    product_id: ProductId,
    sku: String,
    name: String,
    quantity: u32,
    reserved_quantity: u32,
    available_quantity: u32,
    reorder_point: u32,
    max_stock: u32,
    warehouse: Warehouse,
    cost: StockCost,
    status: InventoryStatus,
    is_low_stock: bool,
    is_out_of_stock: bool,
    last_movement: DateTime<Utc>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Document for InventoryRecord {
    const COLLECTION: &'static str = "inventory";

    fn id(&self) -> RecordId {
        self.id
    }

    fn before_save(&mut self) {
        self.recompute_derived();
        self.updated_at = Utc::now();
    }
}

impl InventoryRecord {
    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn inventory_id(&self) -> &str {
        &self.inventory_id
    }

    pub fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn reserved_quantity(&self) -> u32 {
        self.reserved_quantity
    }

    pub fn available_quantity(&self) -> u32 {
        self.available_quantity
    }

    pub fn reorder_point(&self) -> u32 {
        self.reorder_point
    }

    pub fn max_stock(&self) -> u32 {
        self.max_stock
    }

    pub fn warehouse(&self) -> &Warehouse {
        &self.warehouse
    }

    pub fn cost(&self) -> &StockCost {
        &self.cost
    }

    pub fn status(&self) -> InventoryStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == InventoryStatus::Active
    }

    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.reorder_point
    }

    pub fn is_out_of_stock(&self) -> bool {
        self.unreserved() == 0
    }

    pub fn last_movement(&self) -> DateTime<Utc> {
        self.last_movement
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn unreserved(&self) -> u32 {
        self.quantity.saturating_sub(self.reserved_quantity)
    }
}

impl InventoryRecord {
    /// Creates an active record from validated input.
    pub fn create(
        id: RecordId,
        inventory_id: String,
        item: NewInventoryItem,
        now: DateTime<Utc>,
    ) -> Result<Self, InventoryError> {
        if item.product_id.as_str().trim().is_empty() {
            return Err(InventoryError::MissingField("productId"));
        }
        if item.sku.trim().is_empty() {
            return Err(InventoryError::MissingField("sku"));
        }
        if item.name.trim().is_empty() {
            return Err(InventoryError::MissingField("name"));
        }

        let mut record = Self {
            id,
            inventory_id,
            product_id: item.product_id,
            sku: item.sku,
            name: item.name,
            quantity: item.quantity,
            reserved_quantity: 0,
            available_quantity: 0,
            reorder_point: item.reorder_point.unwrap_or(DEFAULT_REORDER_POINT),
            max_stock: item.max_stock.unwrap_or(DEFAULT_MAX_STOCK),
            warehouse: item.warehouse.unwrap_or_default(),
            cost: StockCost {
                unit_cost: item.unit_cost,
                total_cost: Money::zero(),
                currency: item.currency.unwrap_or_else(|| "USD".to_string()),
            },
            status: InventoryStatus::Active,
            is_low_stock: false,
            is_out_of_stock: false,
            last_movement: now,
            notes: item.notes,
            created_at: now,
            updated_at: now,
        };
        record.recompute_derived();
        Ok(record)
    }

    /// Holds `qty` units of unreserved stock.
    pub fn reserve(&mut self, qty: u32, now: DateTime<Utc>) -> Result<(), InventoryError> {
        ensure_positive(qty)?;
        let available = self.unreserved();
        if available < qty {
            return Err(InventoryError::InsufficientStock {
                available,
                requested: qty,
            });
        }
        self.reserved_quantity += qty;
        self.moved(now);
        Ok(())
    }

    /// Releases up to `qty` reserved units. Returns how many were released.
    pub fn release(&mut self, qty: u32, now: DateTime<Utc>) -> Result<u32, InventoryError> {
        ensure_positive(qty)?;
        let released = qty.min(self.reserved_quantity);
        self.reserved_quantity -= released;
        if released > 0 {
            self.moved(now);
        }
        Ok(released)
    }

    /// Consummates a sale: clears up to `qty` of the reservation and takes
    /// `qty` off physical stock, floored at zero.
    pub fn confirm_movement(&mut self, qty: u32, now: DateTime<Utc>) -> Result<(), InventoryError> {
        ensure_positive(qty)?;
        let before = (self.quantity, self.reserved_quantity);
        self.reserved_quantity -= qty.min(self.reserved_quantity);
        self.quantity = self.quantity.saturating_sub(qty);
        if before != (self.quantity, self.reserved_quantity) {
            self.moved(now);
        }
        Ok(())
    }

    /// Restocks `qty` units. With a unit cost the stored unit cost becomes
    /// the weighted average of old and new stock.
    pub fn add_stock(
        &mut self,
        qty: u32,
        unit_cost: Option<Money>,
        now: DateTime<Utc>,
    ) -> Result<(), InventoryError> {
        ensure_positive(qty)?;
        let current_total = self.cost.unit_cost.multiply(self.quantity);
        self.quantity += qty;
        if let Some(cost) = unit_cost {
            let new_total = current_total + cost.multiply(qty);
            self.cost.unit_cost = new_total.divide_rounded(self.quantity);
        }
        self.moved(now);
        Ok(())
    }

    fn moved(&mut self, now: DateTime<Utc>) {
        self.last_movement = now;
    }

    fn recompute_derived(&mut self) {
        self.available_quantity = self.unreserved();
        self.cost.total_cost = self.cost.unit_cost.multiply(self.quantity);
        self.is_low_stock = self.is_low_stock();
        self.is_out_of_stock = self.is_out_of_stock();
    }
}

fn ensure_positive(qty: u32) -> Result<(), InventoryError> {
    if qty == 0 {
        Err(InventoryError::InvalidQuantity)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn record(quantity: u32) -> InventoryRecord {
        InventoryRecord::create(
            RecordId::new(),
            "INV-TEST".into(),
            NewInventoryItem {
                product_id: ProductId::new("P1"),
                sku: "SKU-P1".into(),
                name: "Widget".into(),
                quantity,
                unit_cost: Money::from_cents(10_00),
                ..Default::default()
            },
            Utc::now() - Duration::hours(1),
        )
        .unwrap()
    }

    fn assert_ledger_invariants(r: &InventoryRecord) {
        let mut saved = r.clone();
        saved.before_save();
        assert!(saved.reserved_quantity() <= saved.quantity());
        assert_eq!(
            saved.available_quantity(),
            saved.quantity().saturating_sub(saved.reserved_quantity())
        );
    }

    #[test]
    fn test_create_applies_defaults() {
        let r = record(5);
        assert_eq!(r.reorder_point(), 10);
        assert_eq!(r.max_stock(), 1000);
        assert_eq!(r.warehouse().id, "MAIN");
        assert_eq!(r.warehouse().name, "Main Warehouse");
        assert_eq!(r.cost().currency, "USD");
        assert_eq!(r.available_quantity(), 5);
        assert_eq!(r.cost().total_cost, Money::from_cents(50_00));
        assert!(r.is_low_stock());
    }

    #[test]
    fn test_create_requires_identity_fields() {
        let result = InventoryRecord::create(
            RecordId::new(),
            "INV".into(),
            NewInventoryItem {
                product_id: ProductId::new("P1"),
                name: "Widget".into(),
                ..Default::default()
            },
            Utc::now(),
        );
        assert!(matches!(result, Err(InventoryError::MissingField("sku"))));
    }

    #[test]
    fn test_reserve_exactly_available_then_reject() {
        let mut r = record(5);
        let now = Utc::now();

        r.reserve(5, now).unwrap();
        r.before_save();
        assert_eq!(r.reserved_quantity(), 5);
        assert_eq!(r.available_quantity(), 0);
        assert!(r.is_out_of_stock());

        let result = r.reserve(1, now);
        assert!(matches!(
            result,
            Err(InventoryError::InsufficientStock {
                available: 0,
                requested: 1
            })
        ));
        assert_eq!(r.reserved_quantity(), 5);
    }

    #[test]
    fn test_release_caps_at_reserved() {
        let mut r = record(10);
        let now = Utc::now();
        r.reserve(3, now).unwrap();

        assert_eq!(r.release(7, now).unwrap(), 3);
        assert_eq!(r.reserved_quantity(), 0);
        assert_eq!(r.release(1, now).unwrap(), 0);
    }

    #[test]
    fn test_confirm_movement_clears_reservation_and_stock() {
        let mut r = record(10);
        let now = Utc::now();
        r.reserve(3, now).unwrap();

        r.confirm_movement(3, now).unwrap();
        r.before_save();
        assert_eq!(r.quantity(), 7);
        assert_eq!(r.reserved_quantity(), 0);
        assert_eq!(r.available_quantity(), 7);
    }

    #[test]
    fn test_confirm_movement_floors_at_zero() {
        let mut r = record(2);
        r.confirm_movement(5, Utc::now()).unwrap();
        assert_eq!(r.quantity(), 0);
        assert_eq!(r.reserved_quantity(), 0);
    }

    #[test]
    fn test_last_movement_only_changes_on_movement() {
        let mut r = record(10);
        let created = r.last_movement();
        let later = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();

        r.release(5, later).unwrap();
        assert_eq!(r.last_movement(), created);

        r.reserve(1, later).unwrap();
        assert_eq!(r.last_movement(), later);
    }

    #[test]
    fn test_add_stock_weighted_average_cost() {
        let mut r = record(10); // 10 units at 10.00
        r.add_stock(10, Some(Money::from_cents(20_00)), Utc::now())
            .unwrap();
        r.before_save();

        assert_eq!(r.quantity(), 20);
        assert_eq!(r.cost().unit_cost, Money::from_cents(15_00));
        assert_eq!(r.cost().total_cost, Money::from_cents(300_00));
    }

    #[test]
    fn test_add_stock_without_cost_keeps_unit_cost() {
        let mut r = record(10);
        r.add_stock(5, None, Utc::now()).unwrap();
        assert_eq!(r.quantity(), 15);
        assert_eq!(r.cost().unit_cost, Money::from_cents(10_00));
    }

    #[test]
    fn test_zero_quantities_rejected() {
        let mut r = record(10);
        let now = Utc::now();
        assert!(matches!(r.reserve(0, now), Err(InventoryError::InvalidQuantity)));
        assert!(matches!(r.release(0, now), Err(InventoryError::InvalidQuantity)));
        assert!(matches!(
            r.confirm_movement(0, now),
            Err(InventoryError::InvalidQuantity)
        ));
        assert!(matches!(
            r.add_stock(0, None, now),
            Err(InventoryError::InvalidQuantity)
        ));
    }

    #[test]
    fn test_invariants_hold_across_operation_sequence() {
        let mut r = record(8);
        let now = Utc::now();
        let ops: [(&str, u32); 9] = [
            ("reserve", 3),
            ("reserve", 6),
            ("confirm", 2),
            ("reserve", 5),
            ("release", 9),
            ("confirm", 10),
            ("add", 4),
            ("reserve", 4),
            ("confirm", 1),
        ];

        for (op, qty) in ops {
            let _ = match op {
                "reserve" => r.reserve(qty, now),
                "release" => r.release(qty, now).map(|_| ()),
                "confirm" => r.confirm_movement(qty, now),
                _ => r.add_stock(qty, None, now),
            };
            assert_ledger_invariants(&r);
        }
    }

    #[test]
    fn test_inventory_id_format() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap();
        let id = generate_inventory_id(now);
        assert!(id.starts_with("INV-20240315-"));
        assert_eq!(id.len(), "INV-20240315-".len() + 8);
    }
}
