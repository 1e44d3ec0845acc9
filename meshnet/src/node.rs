//! `MeshNode`: the single-loop facade a host application actually talks to.
//! Owns the static identity, the handshake manager, the session table, the
//! file transfer manager, and one jitter buffer per peer — generalizing
//! the teacher's one-`Machine`-per-connection model to a node that juggles
//! many peers, matching §5's "single cooperative event loop per peer
//! endpoint, `tokio` current-thread task per node" scheduling model.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::instrument;

use mesh_filetransfer::{FileManager, FileOffer, PrepareSendResult};
use mesh_handshake::{HandshakeManager, KeyManager, Storage, Transport, HANDSHAKE_FINAL, HANDSHAKE_INIT, HANDSHAKE_RESPONSE};
use mesh_noise::Session;
use mesh_realtime::{JitterBuffer, PopResult, PushOutcome};
use mesh_types::{MeshError, MeshResult, PeerId};

use crate::config::MeshConfig;
use crate::event::MeshEvent;

pub struct MeshNode {
    key_manager: Mutex<KeyManager>,
    handshake_manager: Arc<HandshakeManager>,
    file_manager: Arc<FileManager>,
    sessions: Mutex<HashMap<PeerId, Session>>,
    jitter_buffers: Mutex<HashMap<PeerId, JitterBuffer>>,
    config: MeshConfig,
    events: broadcast::Sender<MeshEvent>,
}

impl MeshNode {
    /// Loads (or generates) the node's static identity and wires up every
    /// sub-component. `created_at` is a caller-supplied Unix timestamp,
    /// since this crate never calls the system clock itself.
    #[instrument(skip(storage, transport, config))]
    pub async fn start(
        storage: Arc<dyn Storage>,
        transport: Arc<dyn Transport>,
        config: MeshConfig,
        created_at: i64,
    ) -> MeshResult<Arc<Self>> {
        let mut key_manager = KeyManager::new(storage);
        let identity = key_manager.load_or_generate(created_at).await?;
        let local_static_sk = identity.secret_key();
        let local_static_pk = identity.public_key();

        let (session_tx, session_rx) = mpsc::unbounded_channel();
        let handshake_manager =
            HandshakeManager::new(local_static_sk, local_static_pk, transport, config.handshake.clone(), session_tx);
        let file_manager = FileManager::new(config.file_transfer);

        let (events, _rx) = broadcast::channel(512);

        let node = Arc::new(MeshNode {
            key_manager: Mutex::new(key_manager),
            handshake_manager,
            file_manager,
            sessions: Mutex::new(HashMap::new()),
            jitter_buffers: Mutex::new(HashMap::new()),
            config,
            events,
        });

        node.clone().spawn_session_collector(session_rx);
        node.clone().spawn_event_forwarders();

        Ok(node)
    }

    pub fn local_static_public_key(&self) -> [u8; 32] {
        self.handshake_manager.local_static_public_key()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MeshEvent> {
        self.events.subscribe()
    }

    fn spawn_session_collector(self: Arc<Self>, mut session_rx: mpsc::UnboundedReceiver<(PeerId, Session)>) {
        tokio::spawn(async move {
            while let Some((peer_id, session)) = session_rx.recv().await {
                self.sessions.lock().await.insert(peer_id, session);
            }
        });
    }

    fn spawn_event_forwarders(self: Arc<Self>) {
        let handshake_events = self.handshake_manager.subscribe();
        let file_events = self.file_manager.subscribe();
        let sink = self.events.clone();

        tokio::spawn(forward(handshake_events, sink.clone()));
        tokio::spawn(forward(file_events, sink));
    }

    /// Initiates a handshake with `peer_id`, returning once the session is
    /// established and in the node's session table (or on failure/timeout).
    pub async fn connect(self: &Arc<Self>, peer_id: PeerId) -> MeshResult<()> {
        self.handshake_manager.initiate(peer_id).await
    }

    /// Feeds one incoming wire frame (`type_byte ‖ payload`) into the
    /// handshake state machine for `peer_id`.
    pub async fn handle_handshake_frame(self: &Arc<Self>, peer_id: PeerId, frame: &[u8]) -> MeshResult<()> {
        if frame.is_empty() {
            return Err(MeshError::MessageInvalidFormat("empty handshake frame".into()));
        }
        let type_byte = frame[0];
        if !matches!(type_byte, HANDSHAKE_INIT | HANDSHAKE_RESPONSE | HANDSHAKE_FINAL) {
            return Err(MeshError::MessageInvalidFormat(format!("unknown handshake type byte {type_byte}")));
        }
        self.handshake_manager.on_incoming(peer_id, type_byte, &frame[1..]).await
    }

    pub fn cancel_handshake(&self, peer_id: &PeerId) {
        self.handshake_manager.cancel(peer_id);
    }

    /// Encrypts `plaintext` for an already-established session with `peer_id`.
    pub async fn send_message(&self, peer_id: &PeerId, plaintext: &[u8]) -> MeshResult<Vec<u8>> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions.get_mut(peer_id).ok_or(MeshError::ConnectionClosed)?;
        session.encrypt(plaintext)
    }

    /// Decrypts `frame` using the established session with `peer_id`.
    pub async fn receive_message(&self, peer_id: &PeerId, frame: &[u8]) -> MeshResult<Vec<u8>> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions.get_mut(peer_id).ok_or(MeshError::ConnectionClosed)?;
        session.decrypt(frame)
    }

    pub async fn has_session(&self, peer_id: &PeerId) -> bool {
        self.sessions.lock().await.contains_key(peer_id)
    }

    pub async fn destroy_session(&self, peer_id: &PeerId) {
        if let Some(mut session) = self.sessions.lock().await.remove(peer_id) {
            session.destroy();
        }
    }

    pub fn prepare_send_file(
        &self,
        peer_id: PeerId,
        data: Vec<u8>,
        name: String,
        mime_type: String,
    ) -> MeshResult<PrepareSendResult> {
        self.file_manager.prepare_send(peer_id, data, name, mime_type)
    }

    pub fn mark_file_chunk_sent(&self, transfer_id: &str, index: u32) -> MeshResult<()> {
        self.file_manager.mark_chunk_sent(transfer_id, index)
    }

    pub fn handle_file_offer(&self, offer: FileOffer, sender_id: PeerId) -> MeshResult<String> {
        self.file_manager.handle_offer(offer, sender_id)
    }

    pub fn handle_file_chunk(&self, transfer_id: &str, index: u32, data: Vec<u8>) -> MeshResult<()> {
        self.file_manager.handle_chunk(transfer_id, index, data)
    }

    pub fn cancel_file_transfer(&self, transfer_id: &str) -> MeshResult<()> {
        self.file_manager.cancel_transfer(transfer_id)
    }

    pub async fn push_audio_frame(&self, peer_id: PeerId, frame: Vec<u8>, seq: u64) -> PushOutcome {
        let mut buffers = self.jitter_buffers.lock().await;
        let buffer = buffers.entry(peer_id).or_insert_with(|| JitterBuffer::new(self.config.jitter_buffer));
        buffer.push(frame, seq)
    }

    pub async fn pop_audio_frame(&self, peer_id: &PeerId) -> Option<PopResult> {
        let mut buffers = self.jitter_buffers.lock().await;
        buffers.get_mut(peer_id).map(|buffer| buffer.pop())
    }
}

async fn forward<T: Into<MeshEvent>>(mut receiver: broadcast::Receiver<T>, sink: broadcast::Sender<MeshEvent>)
where
    T: Clone + Send + 'static,
{
    loop {
        match receiver.recv().await {
            Ok(event) => {
                let _ = sink.send(event.into());
            }
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
