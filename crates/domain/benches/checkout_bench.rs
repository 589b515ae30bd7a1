use std::sync::Arc;

use common::{Money, OrderStatus, ProductId, ShopId, UserId};
use criterion::{criterion_group, criterion_main, Criterion};
use domain::{CartService, CheckoutService, OrderService, PaymentProof, PlaceOrder};
use store::{MemoryStore, Product, ProductRepository, Shop, ShopRepository};

struct World {
    cart: CartService,
    checkout: CheckoutService,
    orders: OrderService,
    buyer: UserId,
    seller: UserId,
    product: Product,
}

async fn build_world() -> World {
    let store = Arc::new(MemoryStore::new());
    let cart = CartService::new(store.clone(), store.clone(), store.clone());
    let checkout = CheckoutService::new(store.clone(), store.clone(), store.clone());
    let orders = OrderService::new(store.clone(), store.clone(), store.clone());

    let seller = UserId::new();
    let shop = Shop {
        id: ShopId::new(),
        owner_id: seller,
        name: "Bench Shop".to_string(),
    };
    ShopRepository::insert(store.as_ref(), shop.clone())
        .await
        .unwrap();

    let product = Product {
        id: ProductId::new(),
        shop_id: shop.id,
        name: "Bench Widget".to_string(),
        price: Money::new(100_000),
        stock: u32::MAX / 2,
        category: "bench".to_string(),
    };
    ProductRepository::insert(store.as_ref(), product.clone())
        .await
        .unwrap();

    World {
        cart,
        checkout,
        orders,
        buyer: UserId::new(),
        seller,
        product,
    }
}

fn place_cmd(selected: Vec<common::CartItemId>, key: String) -> PlaceOrder {
    PlaceOrder {
        shop_id: None,
        selected_items: selected,
        recipient: "Bench".to_string(),
        telephone: "0800".to_string(),
        address: "Bench Street 1".to_string(),
        note: String::new(),
        proof: Some(PaymentProof {
            reference: "proof/bench.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
            size_bytes: 1024,
        }),
        idempotency_key: key,
    }
}

fn bench_place_order(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let world = rt.block_on(build_world());
    let mut n = 0u64;

    c.bench_function("domain/place_order", |b| {
        b.iter(|| {
            n += 1;
            rt.block_on(async {
                let item = world
                    .cart
                    .add_item(world.buyer, world.product.id, 1)
                    .await
                    .unwrap();
                world
                    .checkout
                    .place_order(world.buyer, place_cmd(vec![item.id], format!("bench-{n}")))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_cancel_roundtrip(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let world = rt.block_on(build_world());
    let mut n = 0u64;

    c.bench_function("domain/request_approve_cancel", |b| {
        b.iter(|| {
            n += 1;
            rt.block_on(async {
                let item = world
                    .cart
                    .add_item(world.buyer, world.product.id, 1)
                    .await
                    .unwrap();
                let order = world
                    .checkout
                    .place_order(
                        world.buyer,
                        place_cmd(vec![item.id], format!("bench-cancel-{n}")),
                    )
                    .await
                    .unwrap();

                world
                    .orders
                    .request_cancel(world.buyer, order.id, None)
                    .await
                    .unwrap();
                let cancelled = world
                    .orders
                    .approve_cancel(world.seller, order.id)
                    .await
                    .unwrap();
                assert_eq!(cancelled.status, OrderStatus::Cancelled);
            });
        });
    });
}

criterion_group!(benches, bench_place_order, bench_cancel_roundtrip);
criterion_main!(benches);
