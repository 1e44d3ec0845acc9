//! The three-message Noise_XX handshake itself. Grounded on the teacher's
//! `Machine::gen_act_one/recv_act_one/.../gen_act_three/recv_act_three` — the
//! same shape of "generate my message, mix in the keys it carries" / "receive
//! their message, mix in the keys it proves" pairing — but generalized from
//! Brontide's XK pattern (responder's static key known in advance) to XX
//! (both static keys are carried on the wire, authenticated by the `es`/`se`
//! DH operations), and from secp256k1/ECDH to `mesh_crypto::x25519`.

use mesh_types::{MeshError, MeshResult, Role};
use zeroize::Zeroize;

use mesh_crypto::x25519;

use crate::session::Session;
use crate::symmetric_state::{SymmetricState, PROTOCOL_NAME};

pub const MESSAGE_1_LEN: usize = 32;
pub const MESSAGE_2_LEN: usize = 80;
pub const MESSAGE_3_LEN: usize = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    /// Nothing sent or received yet.
    Start,
    /// Initiator has sent msg1 / responder has received msg1.
    AwaitingMessage2,
    /// Responder has sent msg2, waiting for msg3.
    AwaitingMessage3,
    Complete,
}

/// Drives one side of a single Noise_XX_25519_ChaChaPoly_SHA256 handshake.
/// Not `Clone`: a handshake is consumed exactly once, into a [`Session`].
pub struct HandshakeCore {
    role: Role,
    symmetric: SymmetricState,
    local_static_sk: [u8; 32],
    local_static_pk: [u8; 32],
    local_ephemeral_sk: Option<[u8; 32]>,
    local_ephemeral_pk: Option<[u8; 32]>,
    remote_ephemeral_pk: Option<[u8; 32]>,
    remote_static_pk: Option<[u8; 32]>,
    stage: Stage,
}

impl HandshakeCore {
    pub fn new(role: Role, local_static_sk: [u8; 32], local_static_pk: [u8; 32]) -> Self {
        HandshakeCore {
            role,
            symmetric: SymmetricState::initialize(PROTOCOL_NAME),
            local_static_sk,
            local_static_pk,
            local_ephemeral_sk: None,
            local_ephemeral_pk: None,
            remote_ephemeral_pk: None,
            remote_static_pk: None,
            stage: Stage::Start,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn remote_static_public_key(&self) -> Option<[u8; 32]> {
        self.remote_static_pk
    }

    fn not_in_state(&self, expected: Stage) -> MeshError {
        MeshError::HandshakeInvalidState(format!(
            "expected stage {expected:?}, core is at {:?}",
            self.stage
        ))
    }

    /// **msg1 (initiator -> responder): `e`.** Generates a fresh ephemeral
    /// key pair and sends the raw public key; no encryption has any key to
    /// run under yet, so this is also `EncryptAndHash` of an empty payload.
    pub fn write_message_1(&mut self) -> MeshResult<Vec<u8>> {
        if self.role != Role::Initiator {
            return Err(MeshError::HandshakeInvalidState(
                "write_message_1 is an initiator-only operation".into(),
            ));
        }
        if self.stage != Stage::Start {
            return Err(self.not_in_state(Stage::Start));
        }

        let (e_sk, e_pk) = x25519::generate_key_pair();
        self.local_ephemeral_sk = Some(e_sk);
        self.local_ephemeral_pk = Some(e_pk);
        self.symmetric.mix_hash(&e_pk);

        self.stage = Stage::AwaitingMessage2;
        debug_assert_eq!(e_pk.len(), MESSAGE_1_LEN);
        Ok(e_pk.to_vec())
    }

    /// Responder's receipt of msg1: records the initiator's ephemeral key.
    pub fn read_message_1(&mut self, message: &[u8]) -> MeshResult<()> {
        if self.role != Role::Responder {
            return Err(MeshError::HandshakeInvalidState(
                "read_message_1 is a responder-only operation".into(),
            ));
        }
        if self.stage != Stage::Start {
            return Err(self.not_in_state(Stage::Start));
        }
        if message.len() != MESSAGE_1_LEN {
            return Err(MeshError::MessageInvalidFormat(format!(
                "message 1 must be {MESSAGE_1_LEN} bytes, got {}",
                message.len()
            )));
        }

        let mut re = [0u8; 32];
        re.copy_from_slice(message);
        self.symmetric.mix_hash(&re);
        self.remote_ephemeral_pk = Some(re);

        self.stage = Stage::AwaitingMessage3;
        Ok(())
    }

    /// **msg2 (responder -> initiator): `e, ee, s, es`.** Sends a fresh
    /// ephemeral key, mixes in `ee`, then sends the responder's *encrypted*
    /// static key and mixes in `es`.
    pub fn write_message_2(&mut self) -> MeshResult<Vec<u8>> {
        if self.role != Role::Responder {
            return Err(MeshError::HandshakeInvalidState(
                "write_message_2 is a responder-only operation".into(),
            ));
        }
        if self.stage != Stage::AwaitingMessage3 {
            return Err(self.not_in_state(Stage::AwaitingMessage3));
        }
        let remote_ephemeral = self
            .remote_ephemeral_pk
            .ok_or_else(|| MeshError::HandshakeInvalidState("no remote ephemeral key yet".into()))?;

        let (e_sk, e_pk) = x25519::generate_key_pair();
        self.local_ephemeral_sk = Some(e_sk);
        self.local_ephemeral_pk = Some(e_pk);
        self.symmetric.mix_hash(&e_pk);

        // ee
        let ee = x25519::scalar_mult(&e_sk, &remote_ephemeral);
        self.symmetric.mix_key(&ee)?;

        // s
        let encrypted_static = self.symmetric.encrypt_and_hash(&self.local_static_pk)?;

        // es: responder's static secret with initiator's ephemeral public key.
        let es = x25519::scalar_mult(&self.local_static_sk, &remote_ephemeral);
        self.symmetric.mix_key(&es)?;

        let mut out = Vec::with_capacity(MESSAGE_2_LEN);
        out.extend_from_slice(&e_pk);
        out.extend_from_slice(&encrypted_static);
        debug_assert_eq!(out.len(), MESSAGE_2_LEN);

        // msg2 does not itself advance this core to Complete; the responder
        // still needs msg3 to learn and authenticate the initiator's static
        // key, so the stage stays AwaitingMessage3 until read_message_3.
        Ok(out)
    }

    /// Initiator's receipt of msg2: authenticates the responder.
    pub fn read_message_2(&mut self, message: &[u8]) -> MeshResult<()> {
        if self.role != Role::Initiator {
            return Err(MeshError::HandshakeInvalidState(
                "read_message_2 is an initiator-only operation".into(),
            ));
        }
        if self.stage != Stage::AwaitingMessage2 {
            return Err(self.not_in_state(Stage::AwaitingMessage2));
        }
        if message.len() != MESSAGE_2_LEN {
            return Err(MeshError::MessageInvalidFormat(format!(
                "message 2 must be {MESSAGE_2_LEN} bytes, got {}",
                message.len()
            )));
        }
        let local_ephemeral_sk = self
            .local_ephemeral_sk
            .ok_or_else(|| MeshError::HandshakeInvalidState("no local ephemeral key yet".into()))?;

        let mut re = [0u8; 32];
        re.copy_from_slice(&message[..32]);
        self.symmetric.mix_hash(&re);
        self.remote_ephemeral_pk = Some(re);

        // ee
        let ee = x25519::scalar_mult(&local_ephemeral_sk, &re);
        self.symmetric.mix_key(&ee)?;

        // s: decrypt the responder's static key.
        let encrypted_static = &message[32..];
        let remote_static_bytes = self.symmetric.decrypt_and_hash(encrypted_static)?;
        if remote_static_bytes.len() != 32 {
            return Err(MeshError::MessageInvalidFormat(
                "decrypted remote static key had the wrong length".into(),
            ));
        }
        let mut rs = [0u8; 32];
        rs.copy_from_slice(&remote_static_bytes);

        // es: initiator's ephemeral secret with responder's static public key.
        let es = x25519::scalar_mult(&local_ephemeral_sk, &rs);
        self.symmetric.mix_key(&es)?;
        self.remote_static_pk = Some(rs);

        self.stage = Stage::AwaitingMessage3;
        Ok(())
    }

    /// **msg3 (initiator -> responder): `s, se`.** Sends the initiator's
    /// *encrypted* static key and runs the final `se` DH, completing the
    /// handshake from the initiator's side.
    pub fn write_message_3(&mut self) -> MeshResult<Vec<u8>> {
        if self.role != Role::Initiator {
            return Err(MeshError::HandshakeInvalidState(
                "write_message_3 is an initiator-only operation".into(),
            ));
        }
        if self.stage != Stage::AwaitingMessage3 {
            return Err(self.not_in_state(Stage::AwaitingMessage3));
        }
        let remote_static = self
            .remote_static_pk
            .ok_or_else(|| MeshError::HandshakeInvalidState("no remote static key yet".into()))?;

        let encrypted_static = self.symmetric.encrypt_and_hash(&self.local_static_pk)?;

        // se: initiator's static secret with responder's static public key.
        let se = x25519::scalar_mult(&self.local_static_sk, &remote_static);
        self.symmetric.mix_key(&se)?;

        debug_assert_eq!(encrypted_static.len(), MESSAGE_3_LEN);
        self.stage = Stage::Complete;
        Ok(encrypted_static)
    }

    /// Responder's receipt of msg3: authenticates the initiator and
    /// completes the handshake from the responder's side.
    pub fn read_message_3(&mut self, message: &[u8]) -> MeshResult<()> {
        if self.role != Role::Responder {
            return Err(MeshError::HandshakeInvalidState(
                "read_message_3 is a responder-only operation".into(),
            ));
        }
        if self.stage != Stage::AwaitingMessage3 {
            return Err(self.not_in_state(Stage::AwaitingMessage3));
        }
        if message.len() != MESSAGE_3_LEN {
            return Err(MeshError::MessageInvalidFormat(format!(
                "message 3 must be {MESSAGE_3_LEN} bytes, got {}",
                message.len()
            )));
        }
        let local_ephemeral_sk = self
            .local_ephemeral_sk
            .ok_or_else(|| MeshError::HandshakeInvalidState("no local ephemeral key yet".into()))?;

        let remote_static_bytes = self.symmetric.decrypt_and_hash(message)?;
        if remote_static_bytes.len() != 32 {
            return Err(MeshError::MessageInvalidFormat(
                "decrypted remote static key had the wrong length".into(),
            ));
        }
        let mut rs = [0u8; 32];
        rs.copy_from_slice(&remote_static_bytes);

        // se: responder's ephemeral secret with initiator's static public key.
        let se = x25519::scalar_mult(&local_ephemeral_sk, &rs);
        self.symmetric.mix_key(&se)?;
        self.remote_static_pk = Some(rs);

        self.stage = Stage::Complete;
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.stage == Stage::Complete
    }

    /// Consumes the completed handshake, producing the bidirectional
    /// [`Session`]. Fails if the handshake has not reached its final act.
    pub fn into_session(mut self) -> MeshResult<Session> {
        if self.stage != Stage::Complete {
            return Err(MeshError::HandshakeInvalidState(
                "into_session requested before the handshake completed".into(),
            ));
        }
        let (k_a, k_b) = self.symmetric.split()?;
        let handshake_hash = self.symmetric.handshake_hash();
        let remote_static = self
            .remote_static_pk
            .ok_or_else(|| MeshError::HandshakeInvalidState("missing remote static key at split".into()))?;

        let (send_key, recv_key) = match self.role {
            Role::Initiator => (k_a, k_b),
            Role::Responder => (k_b, k_a),
        };

        self.local_static_sk.zeroize();
        if let Some(mut sk) = self.local_ephemeral_sk.take() {
            sk.zeroize();
        }

        Ok(Session::new(self.role, send_key, recv_key, handshake_hash, remote_static))
    }
}
