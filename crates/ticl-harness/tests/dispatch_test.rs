//! Inbound dispatch: fixed sub-message order, version and token discipline,
//! the post-token-control re-check, and server-clock tracking.

use bytes::Bytes;
use ticl_core::protocol_handler::ProtocolHandlerConfig;
use ticl_core::statistics::{ClientErrorType, ReceivedMessageType};
use ticl_harness::{server_frame, ListenerEvent, TiclWorld};
use ticl_proto::{
    ErrorCode, ErrorMessage, InfoRequestMessage, InfoType, Invalidation, InvalidationMessage,
    ObjectId, Registration, RegistrationOpType, RegistrationStatus, RegistrationStatusMessage,
    RegistrationSyncRequestMessage, Status, StatusCode, TokenControlMessage,
};

const TOKEN: &[u8] = b"test token";

fn world_with_token() -> TiclWorld {
    let mut world = TiclWorld::new(ProtocolHandlerConfig::default());
    world.listener.set_token(TOKEN);
    world
}

fn oid(name: &'static [u8]) -> ObjectId {
    ObjectId::new(4, name)
}

fn invalidation(name: &'static [u8], version: i64) -> Invalidation {
    Invalidation { object_id: oid(name), is_known_version: true, version, payload: None }
}

#[test]
fn composite_frame_dispatches_in_fixed_order() {
    let mut world = world_with_token();

    let mut frame = server_frame(TOKEN, 314_159_265);
    frame.invalidation_message = Some(InvalidationMessage {
        invalidations: vec![invalidation(b"o1", 100), invalidation(b"o2", 119)],
    });
    frame.registration_status_message = Some(RegistrationStatusMessage {
        registration_statuses: vec![RegistrationStatus {
            registration: Registration {
                object_id: oid(b"o1"),
                op_type: RegistrationOpType::Register,
            },
            status: Status::success(),
        }],
    });
    frame.registration_sync_request_message = Some(RegistrationSyncRequestMessage {});
    frame.info_request_message = Some(InfoRequestMessage {
        info_types: vec![InfoType::GetPerformanceCounters],
    });
    world.deliver(&frame);

    let events = &world.listener.events;
    assert_eq!(events.len(), 5);
    assert!(matches!(events[0], ListenerEvent::IncomingHeader { server_time_ms: 314_159_265, .. }));
    assert!(matches!(&events[1], ListenerEvent::Invalidations(invs) if invs.len() == 2));
    assert!(matches!(&events[2], ListenerEvent::RegistrationStatuses(statuses) if statuses.len() == 1));
    assert!(matches!(events[3], ListenerEvent::RegistrationSyncRequest));
    assert!(matches!(&events[4], ListenerEvent::InfoRequest(kinds) if kinds == &vec![InfoType::GetPerformanceCounters]));

    assert_eq!(world.stats.received_count(ReceivedMessageType::Total), 1);
    assert_eq!(world.stats.received_count(ReceivedMessageType::Invalidation), 1);
    assert_eq!(world.handler.last_known_server_time_ms(), 314_159_265);
}

#[test]
fn major_version_mismatch_drops_the_whole_frame() {
    let mut world = world_with_token();

    let mut frame = server_frame(TOKEN, 1_000);
    frame.header.protocol_version.version.major_version += 1;
    frame.token_control_message = Some(TokenControlMessage {
        new_token: Some(Bytes::from_static(b"stolen")),
        status: Status::success(),
    });
    world.deliver(&frame);

    assert!(world.listener.events.is_empty());
    assert_eq!(world.listener.token(), Bytes::from_static(TOKEN));
    assert_eq!(world.stats.error_count(ClientErrorType::ProtocolVersionFailure), 1);
    // The frame still counted as received: it passed structural validation.
    assert_eq!(world.stats.received_count(ReceivedMessageType::Total), 1);
}

#[test]
fn minor_version_mismatch_is_tolerated() {
    let mut world = world_with_token();

    let mut frame = server_frame(TOKEN, 1_000);
    frame.header.protocol_version.version.minor_version += 4;
    world.deliver(&frame);

    assert!(matches!(world.listener.events[0], ListenerEvent::IncomingHeader { .. }));
    assert_eq!(world.stats.error_count(ClientErrorType::ProtocolVersionFailure), 0);
}

#[test]
fn token_mismatch_rejects_the_frame() {
    let mut world = world_with_token();

    let mut frame = server_frame(&b"token-that-should-mismatch"[..], 1_000);
    frame.invalidation_message =
        Some(InvalidationMessage { invalidations: vec![invalidation(b"o1", 5)] });
    world.deliver(&frame);

    assert!(world.listener.events.is_empty());
    assert_eq!(world.stats.error_count(ClientErrorType::TokenMismatch), 1);
    assert_eq!(world.handler.last_known_server_time_ms(), 0);
}

#[test]
fn token_destroy_suppresses_the_rest_of_the_frame() {
    let mut world = world_with_token();

    let mut frame = server_frame(TOKEN, 1_000);
    frame.token_control_message = Some(TokenControlMessage {
        new_token: Some(Bytes::new()),
        status: Status::success(),
    });
    frame.invalidation_message =
        Some(InvalidationMessage { invalidations: vec![invalidation(b"o1", 5)] });
    world.deliver(&frame);

    // The token upcall happened, then the session was gone: no header
    // upcall, no invalidation delivery.
    assert_eq!(world.listener.events.len(), 1);
    assert!(matches!(world.listener.events[0], ListenerEvent::TokenChanged { .. }));
    assert!(world.listener.token().is_empty());
    assert_eq!(world.stats.received_count(ReceivedMessageType::Invalidation), 0);
}

#[test]
fn rejected_token_assign_suppresses_the_rest_of_the_frame() {
    let mut world = TiclWorld::new(ProtocolHandlerConfig::default());
    // No token yet: the empty-token rule lets the frame through to the
    // token-control upcall.
    let mut frame = server_frame(&b"some nonce"[..], 1_000);
    frame.token_control_message = Some(TokenControlMessage {
        new_token: Some(Bytes::from_static(b"fresh")),
        status: Status { code: StatusCode::PermanentFailure, description: Some("bad nonce".into()) },
    });
    frame.invalidation_message =
        Some(InvalidationMessage { invalidations: vec![invalidation(b"o1", 5)] });
    world.deliver(&frame);

    // The listener refused the token, so the session never materialized.
    assert_eq!(world.listener.events.len(), 1);
    assert!(world.listener.token().is_empty());
    assert_eq!(world.stats.received_count(ReceivedMessageType::Invalidation), 0);
}

#[test]
fn structurally_invalid_frame_is_counted_and_ignored() {
    let mut world = world_with_token();

    let mut frame = server_frame(TOKEN, 1_000);
    frame.invalidation_message =
        Some(InvalidationMessage { invalidations: vec![invalidation(b"o1", -1)] });
    world.deliver(&frame);

    assert!(world.listener.events.is_empty());
    assert_eq!(world.stats.error_count(ClientErrorType::IncomingMessageFailure), 1);
    assert_eq!(world.stats.received_count(ReceivedMessageType::Total), 0);
}

#[test]
fn unparseable_bytes_are_dropped_silently() {
    let mut world = world_with_token();

    world.deliver_raw(b"this can't be a valid envelope!");

    assert!(world.listener.events.is_empty());
    assert_eq!(world.stats.received_count(ReceivedMessageType::Total), 0);
    assert_eq!(world.stats.error_count(ClientErrorType::IncomingMessageFailure), 0);
}

#[test]
fn error_message_reaches_the_listener_last() {
    let mut world = world_with_token();

    let mut frame = server_frame(TOKEN, 1_000);
    frame.info_request_message = Some(InfoRequestMessage {
        info_types: vec![InfoType::GetPerformanceCounters],
    });
    frame.error_message = Some(ErrorMessage {
        code: ErrorCode::AuthFailure,
        description: "invalid auth token".to_string(),
    });
    world.deliver(&frame);

    let events = &world.listener.events;
    assert_eq!(events.len(), 3);
    assert!(matches!(events[1], ListenerEvent::InfoRequest(_)));
    assert_eq!(
        events[2],
        ListenerEvent::ErrorMessage {
            code: ErrorCode::AuthFailure,
            description: "invalid auth token".to_string(),
        }
    );
    assert_eq!(world.stats.received_count(ReceivedMessageType::ErrorMessage), 1);
}

#[test]
fn server_time_is_monotone_over_out_of_order_frames() {
    let mut world = world_with_token();

    for server_time_ms in [500, 300, 700, 600] {
        world.deliver(&server_frame(TOKEN, server_time_ms));
    }
    assert_eq!(world.handler.last_known_server_time_ms(), 700);

    // The next outbound header advertises the maximum observed time.
    world.send_info(&[], &[], false);
    assert_eq!(world.only_sent_frame().header.max_known_server_time_ms, 700);
}

#[test]
fn prop_server_time_tracks_the_maximum_of_accepted_frames() {
    use proptest::prelude::*;

    // Each delivered frame either carries the right token (accepted) or a
    // wrong one (dropped); only accepted frames may advance the clock.
    proptest!(|(frames in proptest::collection::vec((0i64..1_000_000, any::<bool>()), 0..30))| {
        let mut world = world_with_token();

        let mut expected = 0i64;
        for (server_time_ms, accepted) in &frames {
            let token: &[u8] = if *accepted { TOKEN } else { b"wrong token" };
            world.deliver(&server_frame(token, *server_time_ms));
            if *accepted {
                expected = expected.max(*server_time_ms);
            }
        }

        prop_assert_eq!(world.handler.last_known_server_time_ms(), expected);
    });
}
