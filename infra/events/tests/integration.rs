use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use strata_event_bus::{EventBus, EventBusError, EventReceiverExt};

#[derive(Clone, Debug, PartialEq, Eq)]
struct GroupModified(pub &'static str);

#[tokio::test]
async fn handlers_and_channels_both_receive() {
    let bus = EventBus::new();
    let hits = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&hits);
    bus.on::<GroupModified>(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let mut rx = bus.subscribe::<GroupModified>().unwrap();

    let reached = bus.publish(GroupModified("logging")).unwrap();
    assert_eq!(reached, 2);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(*rx.recv_event().await.unwrap(), GroupModified("logging"));
}

#[tokio::test]
async fn lagging_receiver_skips_to_the_tail() {
    let bus = EventBus::new();
    let mut rx = bus.subscribe_with_capacity::<usize>(2).unwrap();

    for i in 0..100usize {
        bus.publish(i).unwrap();
    }

    let first = rx.recv_event().await.unwrap();
    assert!(*first >= 98, "expected the tail of the buffer, got {first}");
    let second = rx.recv_event().await.unwrap();
    assert_eq!(*second, *first + 1);
}

#[tokio::test]
async fn watch_keeps_latest_value() {
    let bus = EventBus::new();
    let mut rx = bus.subscribe_watch::<GroupModified>(GroupModified("none")).unwrap();

    bus.publish(GroupModified("a")).unwrap();
    bus.publish(GroupModified("b")).unwrap();

    assert_eq!(*rx.recv_event().await.unwrap(), GroupModified("b"));
}

#[test]
fn channel_kinds_do_not_mix() {
    let bus = EventBus::new();
    let _rx = bus.subscribe::<GroupModified>().unwrap();
    let err = bus.subscribe_watch(GroupModified("x")).unwrap_err();
    assert!(matches!(err, EventBusError::ChannelKindMismatch { .. }));
}

#[tokio::test]
async fn shutdown_closes_receivers() {
    let bus = EventBus::new();
    let mut rx = bus.subscribe::<GroupModified>().unwrap();
    bus.on::<GroupModified>(|_| {});

    assert_eq!(bus.shutdown(), 1);
    assert!(rx.recv_event().await.is_none());
    assert_eq!(bus.handler_count::<GroupModified>(), 0);
    assert_eq!(bus.publish(GroupModified("late")).unwrap(), 0);
}
