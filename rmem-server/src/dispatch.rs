//! Mapping of protocol requests onto pool operations.

use rmem_core::{BlockId, MemError, MemoryPool, Message, MessageKind};

/// Run one request against the pool and build the reply.
///
/// Allocator failures become `success = false` responses and never escape
/// as errors. A failed `Create` carries the `BlockId::NONE` sentinel so
/// clients reading the id field see a negative value.
pub fn process_request(pool: &MemoryPool, request: &Message) -> Message {
    let id = request.id;

    let outcome = match request.kind {
        MessageKind::Create => match pool.create(request.size, &request.type_tag) {
            Ok(id) => Ok(id_payload(id)),
            Err(e) => {
                log_failure("create", id, &e);
                return Message::response(false, id_payload(BlockId::NONE));
            }
        },
        MessageKind::Set => pool.set(id, &request.data).map(|()| Vec::new()),
        MessageKind::Get => pool.get(id, request.size),
        MessageKind::IncreaseRef => pool.increase_ref(id).map(|_| Vec::new()),
        MessageKind::DecreaseRef => pool.decrease_ref(id).map(|_| Vec::new()),
        MessageKind::Response => {
            tracing::warn!("Received a response where a request was expected");
            return Message::failure();
        }
    };

    match outcome {
        Ok(data) => Message::response(true, data),
        Err(e) => {
            log_failure(kind_name(request.kind), id, &e);
            Message::failure()
        }
    }
}

/// Little-endian wire form of a block id.
pub fn id_payload(id: BlockId) -> Vec<u8> {
    id.as_i32().to_le_bytes().to_vec()
}

fn kind_name(kind: MessageKind) -> &'static str {
    match kind {
        MessageKind::Create => "create",
        MessageKind::Set => "set",
        MessageKind::Get => "get",
        MessageKind::IncreaseRef => "increase_ref",
        MessageKind::DecreaseRef => "decrease_ref",
        MessageKind::Response => "response",
    }
}

fn log_failure(op: &str, id: BlockId, error: &MemError) {
    match error {
        MemError::OutOfMemory { .. } | MemError::IdsExhausted { .. } => {
            tracing::warn!(op, code = error.code(), error = %error, "Allocation failed");
        }
        e if e.is_allocator_error() => {
            tracing::debug!(op, id = id.as_i32(), code = error.code(), error = %error, "Request rejected");
        }
        _ => {
            tracing::warn!(op, id = id.as_i32(), code = error.code(), error = %error, "Request failed");
        }
    }
}
