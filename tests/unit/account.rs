// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

#[cfg(test)]
mod tests {
    use mailaccount::prelude::*;
    use std::thread;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    /// Answers fetches with the requested URL so tests stay offline.
    struct EchoHandler;

    impl EventHandler for EchoHandler {
        fn http_get(&self, url: &str) -> EventReply {
            EventReply::Bytes(url.as_bytes().to_vec())
        }
    }

    fn open_account(idle: Duration) -> (TempDir, Account<MemoryEngine>) {
        let dir = tempfile::tempdir().unwrap();
        let account = Account::with_handler(
            MemoryEngine::with_idle_timeout(idle),
            dir.path().join("account.db"),
            Some("test".to_string()),
            Arc::new(EchoHandler),
        )
        .unwrap();
        account.logger().set_timeout(Some(Duration::from_secs(5)));
        (dir, account)
    }

    fn configured_account(idle: Duration) -> (TempDir, Account<MemoryEngine>) {
        let (dir, account) = open_account(idle);
        account
            .set_config(&[("addr", "alice@example.org"), ("mail_pw", "secret")])
            .unwrap();
        account.start().unwrap();
        loop {
            let event = account.logger().get_matching("CONFIGURE_PROGRESS").unwrap();
            if event == Event::ConfigureProgress(1000) {
                break;
            }
        }
        (dir, account)
    }

    #[test]
    fn test_open_creates_store() {
        let (dir, account) = open_account(Duration::from_secs(1));
        assert!(dir.path().join("account.db").exists());
        assert_eq!(account.logid(), "test");
        assert_eq!(account.state(), AccountState::Inactive);
    }

    #[test]
    fn test_open_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        let result = Account::with_handler(
            MemoryEngine::new(),
            blocker.join("account.db"),
            None,
            Arc::new(EchoHandler),
        );
        assert!(matches!(result, Err(AccountError::Open { .. })));
    }

    #[test]
    fn test_default_logid_is_generated() {
        let dir = tempfile::tempdir().unwrap();
        let account = Account::with_handler(
            MemoryEngine::new(),
            dir.path().join("account.db"),
            None,
            Arc::new(EchoHandler),
        )
        .unwrap();
        assert_eq!(account.logid().len(), 8);
    }

    #[test]
    fn test_start_configure_and_shutdown() {
        let (_dir, account) = configured_account(Duration::from_secs(60));
        assert_eq!(account.state(), AccountState::Active);
        assert!(account.is_configured());
        assert_eq!(account.get_config("configured"), "1");

        let connected = account.logger().get_matching("IMAP_CONNECTED").unwrap();
        assert_eq!(
            connected,
            Event::ImapConnected("IMAP-LOGIN as alice@example.org".to_string())
        );

        // Both workers are parked in a 60s idle-wait at this point.
        let started = Instant::now();
        account.shutdown();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(account.state(), AccountState::Inactive);
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let (_dir, account) = open_account(Duration::from_secs(1));
        account.start().unwrap();
        assert!(matches!(account.start(), Err(AccountError::Precondition(_))));
        account.shutdown();
    }

    #[test]
    fn test_restart_after_shutdown_leaves_engine_untouched() {
        let (_dir, account) = open_account(Duration::from_secs(1));
        account.start().unwrap();
        // Without credentials the first configure run ends in an error event.
        while account.logger().get_matching("CONFIGURE_PROGRESS").is_ok() {}
        account.shutdown();
        while account.logger().try_get().is_some() {}
        let replies = account.engine().replies().len();

        account
            .set_config(&[("addr", "alice@example.org"), ("mail_pw", "secret")])
            .unwrap();
        assert!(matches!(account.start(), Err(AccountError::Precondition(_))));
        assert_eq!(account.state(), AccountState::Inactive);

        // No configure job was queued and no callback was registered.
        account.engine().inject(Protocol::Imap, Event::IsOffline);
        account.engine().perform_jobs(Protocol::Imap);
        assert!(!account.is_configured());
        assert_eq!(account.engine().replies().len(), replies);
        assert_eq!(account.logger().pending(), 0);
    }

    #[test]
    fn test_configure_without_credentials_surfaces_error() {
        let (_dir, account) = open_account(Duration::from_secs(1));
        account.start().unwrap();

        let err = loop {
            match account.logger().get_matching("CONFIGURE_PROGRESS") {
                Ok(_) => continue,
                Err(e) => break e,
            }
        };
        match err {
            AccountError::Event { name, data2, .. } => {
                assert_eq!(name, "ERROR");
                assert!(data2.as_text().unwrap().contains("password"));
            }
            other => panic!("expected error event, got {}", other),
        }
        assert!(matches!(account.check_is_configured(), Err(AccountError::NotConfigured)));
        assert!(account.get_self_contact().is_err());
        account.shutdown();
    }

    #[test]
    fn test_probe_answered_online_from_both_workers() {
        let (_dir, account) = configured_account(Duration::from_secs(60));
        for _ in 0..20 {
            account.engine().inject(Protocol::Imap, Event::IsOffline);
            account.engine().inject(Protocol::Smtp, Event::IsOffline);
        }

        let mut probes = 0;
        while probes < 40 {
            if account.logger().get(None, true).unwrap() == Event::IsOffline {
                probes += 1;
            }
        }
        account.shutdown();

        let replies: Vec<_> = account
            .engine()
            .replies()
            .into_iter()
            .filter(|(name, _)| name == "IS_OFFLINE")
            .collect();
        assert_eq!(replies.len(), 40);
        assert!(replies.iter().all(|(_, reply)| *reply == EventReply::Flag(false)));
    }

    #[test]
    fn test_http_get_reply_reaches_engine() {
        let (_dir, account) = configured_account(Duration::from_secs(60));
        account.engine().inject(
            Protocol::Imap,
            Event::HttpGet { url: "https://example.org/autoconfig".to_string() },
        );
        account.logger().get_matching("HTTP_GET").unwrap();
        account.shutdown();

        let reply = account
            .engine()
            .replies()
            .into_iter()
            .find(|(name, _)| name == "HTTP_GET")
            .map(|(_, reply)| reply);
        assert_eq!(reply, Some(EventReply::Bytes(b"https://example.org/autoconfig".to_vec())));
    }

    #[test]
    fn test_no_events_recorded_after_shutdown() {
        let (_dir, account) = configured_account(Duration::from_secs(60));
        account.shutdown();
        while account.logger().try_get().is_some() {}

        account.create_contact("bob@example.org", Some("Bob")).unwrap();
        assert_eq!(account.logger().pending(), 0);
    }

    #[test]
    fn test_events_from_other_threads_are_observed() {
        let (_dir, account) = configured_account(Duration::from_secs(60));
        while account.logger().try_get().is_some() {}

        let bob = thread::scope(|s| {
            s.spawn(|| account.create_contact("bob@example.org", None).unwrap())
                .join()
                .unwrap()
        });
        let event = account.logger().get_matching("CONTACTS_CHANGED").unwrap();
        assert_eq!(event, Event::ContactsChanged(bob.0));
        account.shutdown();
    }

    #[test]
    fn test_contacts_and_chats() {
        let (_dir, account) = configured_account(Duration::from_secs(60));
        assert_eq!(account.get_self_contact().unwrap(), ContactId::SELF);

        let bob = account.create_contact("bob@example.org", Some("Bob")).unwrap();
        let carol = account.create_contact("carol@example.org", None).unwrap();
        assert_eq!(account.get_contacts(None, false, false), vec![bob, carol]);
        assert_eq!(account.get_contacts(Some("bob"), true, false), vec![ContactId::SELF, bob]);
        assert_eq!(account.get_contacts(None, false, true), Vec::<ContactId>::new());

        let chat = account.create_chat_by_contact(bob).unwrap();
        assert_eq!(account.create_chat_by_contact(bob).unwrap(), chat);
        assert!(matches!(
            account.create_chat_by_contact(ContactId(4242)),
            Err(AccountError::Engine(EngineError::UnknownContact(_)))
        ));

        let msg = account.engine().receive_message("carol@example.org").unwrap();
        let carol_chat = account.create_chat_by_message(msg).unwrap();
        assert_ne!(carol_chat, chat);
        assert_eq!(account.get_message_by_id(msg.0), msg);

        account.mark_seen_messages(&[msg]);
        assert!(account.engine().is_seen(msg));
        account.shutdown();
    }

    #[test]
    fn test_drop_shuts_down_workers() {
        let (_dir, account) = configured_account(Duration::from_secs(60));
        let started = Instant::now();
        drop(account);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
