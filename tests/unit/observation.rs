// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

#[cfg(test)]
mod tests {
    use mailaccount::event::{Event, EventPayload};
    use mailaccount::logger::EventLogger;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    const PRODUCERS: i64 = 4;
    const PER_PRODUCER: i64 = 250;

    fn tagged(producer: i64, seq: i64) -> Event {
        Event::from_raw("TICK", EventPayload::Int(producer), EventPayload::Int(seq))
    }

    #[test]
    fn test_concurrent_producers_lose_nothing() {
        let logger = Arc::new(EventLogger::new("fifo", false));

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|producer| {
                let logger = Arc::clone(&logger);
                thread::Builder::new()
                    .name(format!("producer-{}", producer))
                    .spawn(move || {
                        for seq in 0..PER_PRODUCER {
                            logger.record(&tagged(producer, seq));
                        }
                    })
                    .unwrap()
            })
            .collect();

        // Consume while producers are still running.
        let mut last_seq = vec![-1i64; PRODUCERS as usize];
        let mut seen = HashSet::new();
        for _ in 0..(PRODUCERS * PER_PRODUCER) {
            let event = logger.get(Some(Duration::from_secs(5)), true).unwrap();
            let (producer, seq) = event.payload();
            let (producer, seq) = (producer.as_int().unwrap(), seq.as_int().unwrap());

            assert!(seen.insert((producer, seq)), "duplicate event {:?}", event);
            assert!(seq > last_seq[producer as usize], "reordered event {:?}", event);
            last_seq[producer as usize] = seq;
        }

        for producer in producers {
            producer.join().unwrap();
        }
        assert_eq!(seen.len(), (PRODUCERS * PER_PRODUCER) as usize);
        assert_eq!(logger.pending(), 0);
    }

    #[test]
    fn test_consumer_wakes_when_event_arrives() {
        let logger = Arc::new(EventLogger::new("wake", false));
        let producer = {
            let logger = Arc::clone(&logger);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                logger.record(&Event::Info("late".into()));
                logger.record(&Event::ConfigureProgress(1000));
            })
        };

        let event = logger.get_matching("CONFIGURE_").unwrap();
        assert_eq!(event, Event::ConfigureProgress(1000));
        producer.join().unwrap();
    }

    #[test]
    fn test_alternation_pattern() {
        let logger = EventLogger::new("alt", false);
        logger.record(&Event::Info("noise".into()));
        logger.record(&Event::SmtpConnected("SMTP-LOGIN".into()));
        let event = logger.get_matching("IMAP_CONNECTED|SMTP_CONNECTED").unwrap();
        assert_eq!(event.name(), "SMTP_CONNECTED");
    }
}
