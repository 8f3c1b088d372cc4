use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use std::sync::Arc;

use tillbook_core::{InvoiceId, ProductId};
use tillbook_inventory::{InMemoryStockLedger, SaleLine, StockAdjustmentKind, StockLedger};

fn setup(products: usize, stock: i64) -> (Arc<InMemoryStockLedger>, Vec<ProductId>) {
    let ledger = Arc::new(InMemoryStockLedger::new());
    let ids: Vec<ProductId> = (0..products).map(|_| ProductId::new()).collect();
    for &id in &ids {
        ledger
            .adjust(id, StockAdjustmentKind::Set, stock, "opening stock")
            .unwrap();
    }
    (ledger, ids)
}

fn bench_single_adjust(c: &mut Criterion) {
    let mut group = c.benchmark_group("stock_ledger/adjust");
    group.throughput(Throughput::Elements(1));

    group.bench_function("add_one_unit", |b| {
        let (ledger, ids) = setup(1, 0);
        b.iter(|| {
            ledger
                .adjust(
                    black_box(ids[0]),
                    StockAdjustmentKind::Add,
                    1,
                    "goods received",
                )
                .unwrap()
        });
    });

    group.finish();
}

fn bench_reserve_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("stock_ledger/reserve_release");

    for cart_size in [1usize, 4, 16] {
        group.throughput(Throughput::Elements(cart_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(cart_size),
            &cart_size,
            |b, &cart_size| {
                let (ledger, ids) = setup(cart_size, i64::MAX / 2);
                let lines: Vec<SaleLine> = ids
                    .iter()
                    .map(|&product_id| SaleLine {
                        product_id,
                        quantity: 1,
                    })
                    .collect();
                b.iter(|| {
                    let invoice_id = InvoiceId::new();
                    ledger.reserve_for_sale(invoice_id, black_box(&lines)).unwrap();
                    ledger.release_for_sale(invoice_id).unwrap();
                });
            },
        );
    }

    group.finish();
}

fn bench_contended_reservations(c: &mut Criterion) {
    let mut group = c.benchmark_group("stock_ledger/contention");

    // Same product from every thread vs a distinct product per thread: the
    // second case should scale because per-product locks are independent.
    for (name, shared) in [("same_product", true), ("distinct_products", false)] {
        group.bench_function(name, |b| {
            let threads = 4;
            b.iter(|| {
                let (ledger, ids) = setup(if shared { 1 } else { threads }, i64::MAX / 2);
                let handles: Vec<_> = (0..threads)
                    .map(|t| {
                        let ledger = ledger.clone();
                        let product_id = ids[if shared { 0 } else { t }];
                        std::thread::spawn(move || {
                            for _ in 0..100 {
                                let invoice_id = InvoiceId::new();
                                ledger
                                    .reserve_for_sale(
                                        invoice_id,
                                        &[SaleLine {
                                            product_id,
                                            quantity: 1,
                                        }],
                                    )
                                    .unwrap();
                                ledger.release_for_sale(invoice_id).unwrap();
                            }
                        })
                    })
                    .collect();
                for h in handles {
                    h.join().unwrap();
                }
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_single_adjust,
    bench_reserve_release,
    bench_contended_reservations
);
criterion_main!(benches);
