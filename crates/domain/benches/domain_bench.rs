use criterion::{Criterion, criterion_group, criterion_main};
use domain::{Book, BookId, CartLine, Money, OrderService, UserId};
use inventory_store::InMemoryOrderRepository;

async fn stocked_service(
    titles: usize,
    stock: u32,
) -> (OrderService<InMemoryOrderRepository>, Vec<BookId>) {
    let repository = InMemoryOrderRepository::new();
    let mut book_ids = Vec::with_capacity(titles);
    for n in 0..titles {
        let book = Book::new(
            format!("Title {n:03}"),
            "Bench Author",
            Money::from_cents(100 * (n as i64 + 1)),
            stock,
        );
        book_ids.push(book.id);
        repository.insert_book(book).await;
    }
    (OrderService::new(repository), book_ids)
}

fn bench_create_order(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let service = OrderService::new(InMemoryOrderRepository::new());

    c.bench_function("domain/create_order", |b| {
        b.iter(|| {
            rt.block_on(async {
                service.create_order(UserId::new()).await.unwrap();
            });
        });
    });
}

fn bench_add_single_line(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (service, book_ids) = rt.block_on(stocked_service(1, u32::MAX));
    let user_id = UserId::new();

    c.bench_function("domain/add_single_line", |b| {
        b.iter(|| {
            rt.block_on(async {
                service
                    .add_cart_items(user_id, &[CartLine::new(book_ids[0], 1)])
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_add_batch_of_20(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (service, book_ids) = rt.block_on(stocked_service(20, u32::MAX));
    let lines: Vec<CartLine> = book_ids.iter().map(|id| CartLine::new(*id, 1)).collect();
    let user_id = UserId::new();

    c.bench_function("domain/add_batch_of_20", |b| {
        b.iter(|| {
            rt.block_on(async {
                service.add_cart_items(user_id, &lines).await.unwrap();
            });
        });
    });
}

fn bench_full_cart_cycle(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (service, book_ids) = rt.block_on(stocked_service(3, u32::MAX));

    c.bench_function("domain/full_add_remove_checkout", |b| {
        b.iter(|| {
            rt.block_on(async {
                let user_id = UserId::new();
                let lines = [
                    CartLine::new(book_ids[0], 2),
                    CartLine::new(book_ids[1], 1),
                    CartLine::new(book_ids[2], 3),
                ];
                service.add_cart_items(user_id, &lines).await.unwrap();
                service
                    .remove_cart_item(user_id, book_ids[1])
                    .await
                    .unwrap();

                let order_id = service.get_order(user_id).await.unwrap().unwrap().order.id;
                service.checkout(user_id, order_id).await.unwrap();
            });
        });
    });
}

fn bench_history_50_orders(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (service, book_ids) = rt.block_on(stocked_service(5, u32::MAX));
    let user_id = UserId::new();

    // Pre-populate: 50 paid orders of 5 lines each
    rt.block_on(async {
        let lines: Vec<CartLine> = book_ids.iter().map(|id| CartLine::new(*id, 1)).collect();
        for _ in 0..50 {
            service.add_cart_items(user_id, &lines).await.unwrap();
            let order_id = service.get_order(user_id).await.unwrap().unwrap().order.id;
            service.checkout(user_id, order_id).await.unwrap();
        }
    });

    c.bench_function("domain/history_50_orders", |b| {
        b.iter(|| {
            rt.block_on(async {
                let history = service.get_history(user_id).await.unwrap();
                assert_eq!(history.len(), 50);
            });
        });
    });
}

criterion_group!(
    benches,
    bench_create_order,
    bench_add_single_line,
    bench_add_batch_of_20,
    bench_full_cart_cycle,
    bench_history_50_orders,
);
criterion_main!(benches);
