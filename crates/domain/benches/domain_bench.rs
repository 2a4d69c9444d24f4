use chrono::Utc;
use common::{Money, ProductId, RecordId, UserId};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use document_store::{Document, InMemoryDocumentStore};
use domain::{
    Buyer, InventoryLedger, NewInventoryItem, Order, OrderDraft, OrderItem, OrderService,
    PaymentMethod, ShippingAddress,
};

fn draft(item_count: usize) -> OrderDraft {
    OrderDraft {
        buyer: Buyer {
            user_id: UserId::new(),
            email: "bench@example.com".to_string(),
        },
        items: (0..item_count)
            .map(|i| {
                OrderItem::new(
                    format!("SKU-{i:03}"),
                    format!("Product {i}"),
                    Money::from_cents(100 * (i as i64 + 1)),
                    (i % 3 + 1) as u32,
                )
            })
            .collect(),
        shipping_address: ShippingAddress::new("Main 1", "Warsaw", "00-001", None),
        payment_method: PaymentMethod::Card,
        notes: None,
    }
}

fn bench_order_totals(c: &mut Criterion) {
    let mut group = c.benchmark_group("domain/order_totals");
    for size in [1usize, 10, 100] {
        let order = Order::place(RecordId::new(), "ORD".into(), draft(size), Utc::now()).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &order, |b, order| {
            b.iter(|| {
                let mut order = order.clone();
                order.before_save();
                order.final_amount()
            });
        });
    }
    group.finish();
}

fn bench_place_order(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let service = OrderService::new(InMemoryDocumentStore::new());

    c.bench_function("domain/place_order", |b| {
        b.iter(|| {
            rt.block_on(async {
                service.place(draft(3)).await.unwrap();
            });
        });
    });
}

fn bench_reserve_release(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ledger = InventoryLedger::new(InMemoryDocumentStore::new());
    let product = ProductId::new("BENCH");
    rt.block_on(async {
        ledger
            .create_item(NewInventoryItem {
                product_id: product.clone(),
                sku: "SKU-BENCH".into(),
                name: "Benchmark Widget".into(),
                quantity: 1_000_000,
                unit_cost: Money::from_cents(100),
                ..Default::default()
            })
            .await
            .unwrap();
    });

    c.bench_function("domain/reserve_then_release", |b| {
        b.iter(|| {
            rt.block_on(async {
                ledger.reserve_stock(&product, 1, "MAIN").await.unwrap();
                ledger
                    .release_reserved_stock(&product, 1, "MAIN")
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_order_totals,
    bench_place_order,
    bench_reserve_release,
);
criterion_main!(benches);
