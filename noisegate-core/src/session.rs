//! Noise_XX session engine.
//!
//! Wraps `snow`'s state machine behind the fixed operation surface the
//! boundary crate is written against: every operation writes into a
//! caller-provided destination slice and returns the written length, and the
//! session moves from the handshake phase to the transport phase exactly
//! once, when the final handshake message is produced or consumed.
//!
//! # Security Properties
//!
//! - Static keys are session-scoped and zeroized on drop
//! - The remote static key is captured at the phase transition and is the
//!   only handshake artifact retained
//! - `snow` panics rather than erroring when a destination slice is too
//!   small, so every operation checks capacity before calling into it

use snow::{Builder, HandshakeState, TransportState};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{EngineError, Result};

/// Noise protocol pattern: XX for mutual authentication, with Curve25519,
/// ChaCha20-Poly1305, and BLAKE2s.
pub const PATTERN: &str = "Noise_XX_25519_ChaChaPoly_BLAKE2s";

/// Maximum length of a single Noise message on the wire.
pub const MAX_MESSAGE_LEN: usize = 65535;

/// Length of the AEAD authentication tag appended to every ciphertext.
pub const TAG_LEN: usize = 16;

/// Maximum payload length that still fits a Noise message with its tag.
pub const MAX_PAYLOAD_LEN: usize = MAX_MESSAGE_LEN - TAG_LEN;

/// Role in the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Sends the first handshake message.
    Initiator,
    /// Receives the first handshake message.
    Responder,
}

/// Session-scoped static keypair. Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
struct SessionKeypair {
    secret: [u8; 32],
    public: [u8; 32],
}

impl SessionKeypair {
    /// Generate a fresh keypair from the OS CSPRNG.
    fn generate() -> Result<Self> {
        let keypair = Builder::new(PATTERN.parse()?).generate_keypair()?;

        let mut secret = [0u8; 32];
        let mut public = [0u8; 32];
        secret.copy_from_slice(&keypair.private);
        public.copy_from_slice(&keypair.public);

        Ok(Self { secret, public })
    }

    /// Rebuild a keypair from a caller-supplied private key, deriving the
    /// public half so both constructors expose the same key surface.
    fn from_secret(secret: [u8; 32]) -> Self {
        let public = *PublicKey::from(&StaticSecret::from(secret)).as_bytes();
        Self { secret, public }
    }
}

enum State {
    /// Handshake in progress.
    Handshake(Box<HandshakeState>),
    /// Transport established.
    Transport(Box<TransportState>),
    /// Placeholder while the handshake state is being consumed.
    Transitioning,
}

/// A Noise session, in either the handshake or the transport phase.
pub struct NoiseSession {
    state: State,
    keypair: SessionKeypair,
    /// Peer's static public key, captured at the phase transition.
    remote_static: Option<[u8; 32]>,
}

impl NoiseSession {
    /// Create a session with a freshly generated static keypair.
    pub fn new(mode: Mode) -> Result<Self> {
        Self::build(SessionKeypair::generate()?, mode)
    }

    /// Create a session bound to the caller's 32-byte static private key.
    pub fn with_private_key(private_key: &[u8; 32], mode: Mode) -> Result<Self> {
        Self::build(SessionKeypair::from_secret(*private_key), mode)
    }

    fn build(keypair: SessionKeypair, mode: Mode) -> Result<Self> {
        let builder = Builder::new(PATTERN.parse()?).local_private_key(&keypair.secret);
        let handshake = match mode {
            Mode::Initiator => builder.build_initiator()?,
            Mode::Responder => builder.build_responder()?,
        };

        Ok(Self {
            state: State::Handshake(Box::new(handshake)),
            keypair,
            remote_static: None,
        })
    }

    /// Check whether the handshake has completed.
    ///
    /// Monotone: once true, it stays true for the life of the session.
    pub fn is_handshake_complete(&self) -> bool {
        matches!(self.state, State::Transport(_))
    }

    /// Our static public key. Available in every phase.
    pub fn public_key(&self) -> &[u8; 32] {
        &self.keypair.public
    }

    /// Peer's static public key. `Some` only after the handshake completes.
    pub fn remote_static(&self) -> Option<&[u8; 32]> {
        self.remote_static.as_ref()
    }

    /// Produce the next handshake message, carrying `payload`, into `out`.
    ///
    /// Returns the number of bytes written. `out` must be sized to
    /// [`MAX_MESSAGE_LEN`]; the documented maxima are authoritative and there
    /// is no probe-then-retry path.
    ///
    /// # Errors
    ///
    /// `InvalidState` once the session is in the transport phase,
    /// `InvalidParameter` for payloads over [`MAX_PAYLOAD_LEN`],
    /// `HandshakeFailed` for protocol-level failures.
    pub fn write_message(&mut self, payload: &[u8], out: &mut [u8]) -> Result<usize> {
        let hs = match &mut self.state {
            State::Handshake(hs) => hs,
            State::Transport(_) => {
                return Err(EngineError::InvalidState(
                    "write_message after handshake completion",
                ))
            }
            State::Transitioning => return Err(EngineError::InvalidState("session mid-transition")),
        };

        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(EngineError::InvalidParameter);
        }
        if out.len() < MAX_MESSAGE_LEN {
            return Err(EngineError::BufferTooSmall {
                needed: MAX_MESSAGE_LEN,
                available: out.len(),
            });
        }

        let written = hs.write_message(payload, out).map_err(map_handshake_err)?;
        self.after_handshake_step()?;

        Ok(written)
    }

    /// Consume a peer handshake message, writing its payload into `out`.
    ///
    /// Returns the payload length, which is always at most `message.len()`.
    ///
    /// # Errors
    ///
    /// `InvalidState` once the session is in the transport phase,
    /// `InvalidParameter` for messages over [`MAX_MESSAGE_LEN`],
    /// `HandshakeFailed` for malformed or unauthentic messages.
    pub fn read_message(&mut self, message: &[u8], out: &mut [u8]) -> Result<usize> {
        let hs = match &mut self.state {
            State::Handshake(hs) => hs,
            State::Transport(_) => {
                return Err(EngineError::InvalidState(
                    "read_message after handshake completion",
                ))
            }
            State::Transitioning => return Err(EngineError::InvalidState("session mid-transition")),
        };

        if message.len() > MAX_MESSAGE_LEN {
            return Err(EngineError::InvalidParameter);
        }
        if out.len() < message.len() {
            return Err(EngineError::BufferTooSmall {
                needed: message.len(),
                available: out.len(),
            });
        }

        let written = hs.read_message(message, out).map_err(map_handshake_err)?;
        self.after_handshake_step()?;

        Ok(written)
    }

    /// Move to the transport phase if `snow` reports the handshake finished,
    /// capturing the peer's static key before the state is consumed.
    fn after_handshake_step(&mut self) -> Result<()> {
        let finished = matches!(&self.state, State::Handshake(hs) if hs.is_handshake_finished());
        if !finished {
            return Ok(());
        }

        let hs = match std::mem::replace(&mut self.state, State::Transitioning) {
            State::Handshake(hs) => hs,
            _ => return Err(EngineError::InvalidState("session mid-transition")),
        };

        if let Some(key) = hs.get_remote_static() {
            let mut remote = [0u8; 32];
            remote.copy_from_slice(key);
            self.remote_static = Some(remote);
        }

        let transport = hs
            .into_transport_mode()
            .map_err(|_| EngineError::HandshakeFailed)?;
        self.state = State::Transport(Box::new(transport));

        Ok(())
    }

    /// Encrypt `plaintext` into `out`.
    ///
    /// The output is exactly `plaintext.len() + TAG_LEN` bytes.
    ///
    /// # Errors
    ///
    /// `InvalidState` before the handshake completes, `InvalidParameter` for
    /// plaintexts over [`MAX_PAYLOAD_LEN`], `BufferTooSmall` when `out`
    /// cannot hold the ciphertext and tag.
    pub fn encrypt(&mut self, plaintext: &[u8], out: &mut [u8]) -> Result<usize> {
        let transport = match &mut self.state {
            State::Transport(t) => t,
            State::Handshake(_) => {
                return Err(EngineError::InvalidState(
                    "encrypt before handshake completion",
                ))
            }
            State::Transitioning => return Err(EngineError::InvalidState("session mid-transition")),
        };

        if plaintext.len() > MAX_PAYLOAD_LEN {
            return Err(EngineError::InvalidParameter);
        }
        let needed = plaintext.len() + TAG_LEN;
        if out.len() < needed {
            return Err(EngineError::BufferTooSmall {
                needed,
                available: out.len(),
            });
        }

        transport.write_message(plaintext, out).map_err(|err| match err {
            snow::Error::Input => EngineError::InvalidParameter,
            _ => EngineError::EncryptionFailed,
        })
    }

    /// Decrypt and authenticate `ciphertext` into `out`.
    ///
    /// The output is exactly `ciphertext.len() - TAG_LEN` bytes.
    ///
    /// # Errors
    ///
    /// `InvalidState` before the handshake completes, `DecryptionFailed` for
    /// ciphertexts shorter than the tag or failing authentication,
    /// `BufferTooSmall` when `out` cannot hold the plaintext.
    pub fn decrypt(&mut self, ciphertext: &[u8], out: &mut [u8]) -> Result<usize> {
        let transport = match &mut self.state {
            State::Transport(t) => t,
            State::Handshake(_) => {
                return Err(EngineError::InvalidState(
                    "decrypt before handshake completion",
                ))
            }
            State::Transitioning => return Err(EngineError::InvalidState("session mid-transition")),
        };

        if ciphertext.len() > MAX_MESSAGE_LEN {
            return Err(EngineError::InvalidParameter);
        }
        if ciphertext.len() < TAG_LEN {
            return Err(EngineError::DecryptionFailed);
        }
        let needed = ciphertext.len() - TAG_LEN;
        if out.len() < needed {
            return Err(EngineError::BufferTooSmall {
                needed,
                available: out.len(),
            });
        }

        transport
            .read_message(ciphertext, out)
            .map_err(|_| EngineError::DecryptionFailed)
    }
}

impl Drop for NoiseSession {
    fn drop(&mut self) {
        // keypair zeroizes itself; the captured remote key is cleared too
        if let Some(ref mut key) = self.remote_static {
            key.zeroize();
        }
    }
}

fn map_handshake_err(err: snow::Error) -> EngineError {
    match err {
        snow::Error::Input => EngineError::InvalidParameter,
        snow::Error::Decrypt => EngineError::HandshakeFailed,
        snow::Error::State(_) => EngineError::InvalidState("handshake state rejected the call"),
        other => EngineError::Protocol(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg_buf() -> Vec<u8> {
        vec![0u8; MAX_MESSAGE_LEN]
    }

    fn perform_handshake() -> (NoiseSession, NoiseSession) {
        let mut initiator = NoiseSession::new(Mode::Initiator).unwrap();
        let mut responder = NoiseSession::new(Mode::Responder).unwrap();

        let mut msg = msg_buf();
        let mut payload = msg_buf();

        // Message 1: initiator -> responder (e)
        let n = initiator.write_message(&[], &mut msg).unwrap();
        responder.read_message(&msg[..n], &mut payload).unwrap();

        // Message 2: responder -> initiator (e, ee, s, es)
        let n = responder.write_message(&[], &mut msg).unwrap();
        initiator.read_message(&msg[..n], &mut payload).unwrap();

        // Message 3: initiator -> responder (s, se)
        let n = initiator.write_message(&[], &mut msg).unwrap();
        responder.read_message(&msg[..n], &mut payload).unwrap();

        (initiator, responder)
    }

    #[test]
    fn keypairs_are_unique() {
        let a = NoiseSession::new(Mode::Initiator).unwrap();
        let b = NoiseSession::new(Mode::Initiator).unwrap();
        assert_ne!(a.public_key(), b.public_key());
    }

    #[test]
    fn with_private_key_derives_stable_public_key() {
        let key = [7u8; 32];
        let a = NoiseSession::with_private_key(&key, Mode::Initiator).unwrap();
        let b = NoiseSession::with_private_key(&key, Mode::Responder).unwrap();
        assert_eq!(a.public_key(), b.public_key());
    }

    #[test]
    fn handshake_completes_on_third_message() {
        let mut initiator = NoiseSession::new(Mode::Initiator).unwrap();
        let mut responder = NoiseSession::new(Mode::Responder).unwrap();

        let mut msg = msg_buf();
        let mut payload = msg_buf();

        let n = initiator.write_message(&[], &mut msg).unwrap();
        responder.read_message(&msg[..n], &mut payload).unwrap();
        assert!(!initiator.is_handshake_complete());
        assert!(!responder.is_handshake_complete());

        let n = responder.write_message(&[], &mut msg).unwrap();
        initiator.read_message(&msg[..n], &mut payload).unwrap();
        assert!(!initiator.is_handshake_complete());
        assert!(!responder.is_handshake_complete());

        let n = initiator.write_message(&[], &mut msg).unwrap();
        assert!(initiator.is_handshake_complete());
        responder.read_message(&msg[..n], &mut payload).unwrap();
        assert!(responder.is_handshake_complete());
    }

    #[test]
    fn remote_static_matches_peer_public_key() {
        let (initiator, responder) = perform_handshake();

        assert_eq!(initiator.remote_static().unwrap(), responder.public_key());
        assert_eq!(responder.remote_static().unwrap(), initiator.public_key());
    }

    #[test]
    fn remote_static_unavailable_during_handshake() {
        let session = NoiseSession::new(Mode::Initiator).unwrap();
        assert!(session.remote_static().is_none());
    }

    #[test]
    fn handshake_payload_round_trips() {
        let mut initiator = NoiseSession::new(Mode::Initiator).unwrap();
        let mut responder = NoiseSession::new(Mode::Responder).unwrap();

        let mut msg = msg_buf();
        let mut payload = msg_buf();

        let n = initiator.write_message(b"early data", &mut msg).unwrap();
        let p = responder.read_message(&msg[..n], &mut payload).unwrap();
        assert_eq!(&payload[..p], b"early data");
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let (mut alice, mut bob) = perform_handshake();

        let plaintext = b"Hello, Bob!";
        let mut ct = vec![0u8; plaintext.len() + TAG_LEN];
        let n = alice.encrypt(plaintext, &mut ct).unwrap();
        assert_eq!(n, plaintext.len() + TAG_LEN);

        let mut pt = vec![0u8; n];
        let m = bob.decrypt(&ct[..n], &mut pt).unwrap();
        assert_eq!(&pt[..m], plaintext);
    }

    #[test]
    fn bidirectional_transport() {
        let (mut alice, mut bob) = perform_handshake();
        let mut buf = msg_buf();
        let mut out = msg_buf();

        let n = alice.encrypt(b"from alice", &mut buf).unwrap();
        let m = bob.decrypt(&buf[..n], &mut out).unwrap();
        assert_eq!(&out[..m], b"from alice");

        let n = bob.encrypt(b"from bob", &mut buf).unwrap();
        let m = alice.decrypt(&buf[..n], &mut out).unwrap();
        assert_eq!(&out[..m], b"from bob");
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let (mut alice, mut bob) = perform_handshake();
        let mut ct = msg_buf();
        let mut out = msg_buf();

        let n = alice.encrypt(b"secret", &mut ct).unwrap();
        ct[0] ^= 0xFF;

        assert!(matches!(
            bob.decrypt(&ct[..n], &mut out),
            Err(EngineError::DecryptionFailed)
        ));
    }

    #[test]
    fn short_ciphertext_fails_before_cipher() {
        let (_, mut bob) = perform_handshake();
        let mut out = msg_buf();

        assert!(matches!(
            bob.decrypt(&[0u8; 15], &mut out),
            Err(EngineError::DecryptionFailed)
        ));
    }

    #[test]
    fn transport_ops_rejected_during_handshake() {
        let mut session = NoiseSession::new(Mode::Initiator).unwrap();
        let mut buf = msg_buf();

        assert!(matches!(
            session.encrypt(b"test", &mut buf),
            Err(EngineError::InvalidState(_))
        ));
        assert!(matches!(
            session.decrypt(&[0u8; 32], &mut buf),
            Err(EngineError::InvalidState(_))
        ));
    }

    #[test]
    fn handshake_ops_rejected_in_transport() {
        let (mut alice, mut bob) = perform_handshake();
        let mut buf = msg_buf();
        let mut out = msg_buf();

        assert!(matches!(
            alice.write_message(&[], &mut buf),
            Err(EngineError::InvalidState(_))
        ));
        assert!(matches!(
            bob.read_message(&[0u8; 48], &mut out),
            Err(EngineError::InvalidState(_))
        ));
    }

    #[test]
    fn oversized_payload_rejected() {
        let mut session = NoiseSession::new(Mode::Initiator).unwrap();
        let mut buf = msg_buf();
        let too_big = vec![0u8; MAX_PAYLOAD_LEN + 1];

        assert!(matches!(
            session.write_message(&too_big, &mut buf),
            Err(EngineError::InvalidParameter)
        ));
    }

    #[test]
    fn undersized_output_reports_needed_capacity() {
        let (mut alice, _) = perform_handshake();
        let mut small = [0u8; 8];

        match alice.encrypt(b"0123456789", &mut small) {
            Err(EngineError::BufferTooSmall { needed, available }) => {
                assert_eq!(needed, 10 + TAG_LEN);
                assert_eq!(available, 8);
            }
            other => panic!("expected BufferTooSmall, got {other:?}"),
        }
    }

    #[test]
    fn keyed_session_completes_handshake() {
        let key = [0x42u8; 32];
        let mut initiator = NoiseSession::with_private_key(&key, Mode::Initiator).unwrap();
        let mut responder = NoiseSession::new(Mode::Responder).unwrap();

        let mut msg = msg_buf();
        let mut payload = msg_buf();

        let n = initiator.write_message(&[], &mut msg).unwrap();
        responder.read_message(&msg[..n], &mut payload).unwrap();
        let n = responder.write_message(&[], &mut msg).unwrap();
        initiator.read_message(&msg[..n], &mut payload).unwrap();
        let n = initiator.write_message(&[], &mut msg).unwrap();
        responder.read_message(&msg[..n], &mut payload).unwrap();

        assert!(responder.is_handshake_complete());
        assert_eq!(responder.remote_static().unwrap(), initiator.public_key());
    }
}
