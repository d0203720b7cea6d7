//! Publish/subscribe over two connections.
//!
//! The publisher only publishes once the subscriber saw the server confirm
//! its subscription; the two sides hand this over through a oneshot channel
//! instead of sleeping and hoping the subscription is active.

use tokio::{net::TcpStream, sync::oneshot};
use tracing::{debug, warn};

use super::{driver::Driver, AssertionRecord, Expect};
use crate::{
    cmd::{Command, CommandKind},
    clients::Subscriber,
    Client, Error, Frame, LResult,
};

const GROUP: &str = "pub-sub";
const CHANNEL: &str = "parity:channel";
const EARLY: &str = "published before subscribing";
const MESSAGE: &str = "hello";

fn message_frame(payload: &'static str) -> Expect {
    Expect::bulks(["message", CHANNEL, payload])
}

pub(crate) async fn run(driver: &Driver, records: &mut Vec<AssertionRecord>) {
    let early = Command::with_args(CommandKind::Publish, [CHANNEL, EARLY]);
    let publish = Command::with_args(CommandKind::Publish, [CHANNEL, MESSAGE]);
    let subscribe = Command::with_args(CommandKind::Subscribe, [CHANNEL]);

    let publisher = driver.open().await;
    let subscriber = driver.open().await;
    let (mut publisher, subscriber) = match (publisher, subscriber) {
        (Ok(p), Ok(s)) => (p, s),
        (Err(e), _) | (_, Err(e)) => {
            // Without both connections nothing in the family can run.
            let result: LResult<Frame> = Err(e);
            records.push(AssertionRecord::new(
                GROUP,
                "connect",
                "(open publisher and subscriber connections)",
                Expect::ok(),
                &result,
            ));
            return;
        }
    };

    // Nobody listens yet: the message must reach no one, now or later.
    let result = publisher.request(&early).await;
    records.push(AssertionRecord::new(
        GROUP,
        "publish-before-subscribe",
        &early,
        Expect::Integer(0),
        &result,
    ));

    let (subscribed_tx, subscribed_rx) = oneshot::channel();
    let (published_tx, published_rx) = oneshot::channel();
    let listener = tokio::spawn(subscriber_side(subscriber, subscribed_tx, published_rx));

    let timeout = driver.timeouts().request;
    let subscribed = matches!(
        tokio::time::timeout(timeout, subscribed_rx).await,
        Ok(Ok(()))
    );
    let (publish_record, published) = if subscribed {
        let result = publisher.request(&publish).await;
        let record = AssertionRecord::new(GROUP, "publish", &publish, Expect::Integer(1), &result);
        let passed = record.passed();
        (record, passed)
    } else {
        let record = AssertionRecord::skipped(GROUP, "publish", &publish, Expect::Integer(1));
        (record, false)
    };
    // The subscriber skips waiting for the message when nothing was published.
    let _ = published_tx.send(published);

    match listener.await {
        Ok(side) => {
            records.push(side.subscribe);
            records.push(publish_record);
            records.push(side.receive);
            records.push(side.unsubscribe);
        }
        Err(e) => {
            warn!(error = %e, "subscriber task crashed");
            let result: LResult<Frame> = Err(Error::Response(format!("subscriber crashed: {e}")));
            records.push(AssertionRecord::new(
                GROUP,
                "subscribe",
                &subscribe,
                subscribe_confirmation(),
                &result,
            ));
            records.push(publish_record);
        }
    }
    let _ = publisher.close().await;
}

fn subscribe_confirmation() -> Expect {
    Expect::Array(vec![
        Expect::bulk("subscribe"),
        Expect::bulk(CHANNEL),
        Expect::Integer(1),
    ])
}

struct SubscriberRecords {
    subscribe: AssertionRecord,
    receive: AssertionRecord,
    unsubscribe: AssertionRecord,
}

async fn subscriber_side(
    mut client: Client<TcpStream>,
    subscribed_tx: oneshot::Sender<()>,
    published_rx: oneshot::Receiver<bool>,
) -> SubscriberRecords {
    let subscribe = Command::with_args(CommandKind::Subscribe, [CHANNEL]);
    let unsubscribe = Command::with_args(CommandKind::Unsubscribe, [CHANNEL]);
    let channels = [CHANNEL.to_string()];
    let wait_message = format!("(wait for a message on {CHANNEL})");
    let unsubscribe_expect = Expect::Array(vec![
        Expect::bulk("unsubscribe"),
        Expect::bulk(CHANNEL),
        Expect::Integer(0),
    ]);

    let (subscriber, confirmation) = match client.write_command(&subscribe).await {
        Ok(()) => {
            let mut subscriber = Subscriber::new(client);
            let confirmation = subscriber.next_push().await;
            (Some(subscriber), confirmation)
        }
        Err(e) => (None, Err(e)),
    };
    let subscribe_record = AssertionRecord::new(
        GROUP,
        "subscribe",
        &subscribe,
        subscribe_confirmation(),
        &confirmation,
    );
    let mut subscriber = match subscriber {
        Some(subscriber) if subscribe_record.passed() => subscriber,
        _ => {
            // Dropping `subscribed_tx` tells the publisher not to publish.
            return SubscriberRecords {
                subscribe: subscribe_record,
                receive: AssertionRecord::skipped(
                    GROUP,
                    "receive",
                    &wait_message,
                    message_frame(MESSAGE),
                ),
                unsubscribe: AssertionRecord::skipped(
                    GROUP,
                    "unsubscribe",
                    &unsubscribe,
                    unsubscribe_expect,
                ),
            };
        }
    };
    debug!("subscription confirmed");
    let _ = subscribed_tx.send(());

    // A message published before subscribing would show up here instead.
    let receive = if matches!(published_rx.await, Ok(true)) {
        let result = subscriber.next_push().await;
        AssertionRecord::new(GROUP, "receive", &wait_message, message_frame(MESSAGE), &result)
    } else {
        AssertionRecord::skipped(GROUP, "receive", &wait_message, message_frame(MESSAGE))
    };

    // Exactly once: a duplicate delivery would arrive before the confirmation.
    let result = match subscriber.unsubscribe(&channels).await {
        Ok(()) => subscriber.next_push().await,
        Err(e) => Err(e),
    };
    let unsubscribe = AssertionRecord::new(
        GROUP,
        "unsubscribe",
        &unsubscribe,
        unsubscribe_expect,
        &result,
    );

    SubscriberRecords {
        subscribe: subscribe_record,
        receive,
        unsubscribe,
    }
}
