//! Encryption middleware: a trait-based seam for field-level encryption.
//!
//! This crate does not implement a cipher; it defines [`Encryptor`] and
//! [`KeyStore`] the way [`commandflow_core::EventListener`] defines a seam
//! the caller implements, and the same `TypeId`-keyed opt-in registry
//! [`crate::validation::ValidationMiddleware`] uses to reach a command's
//! sensitive fields through type erasure. Key rotation is managed by the
//! caller's `KeyStore`; this middleware only asks it for the current key id
//! before encrypting and the named key id before decrypting.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use commandflow_core::{BoxFuture, Command, CommandError, Context, Priority};
use commandflow_middleware::{Erased, Middleware, Next};

/// Encrypts and decrypts opaque byte payloads under a named key.
pub trait Encryptor: Send + Sync {
    fn encrypt(&self, plaintext: &[u8], key_id: &str) -> Result<Vec<u8>, CommandError>;
    fn decrypt(&self, ciphertext: &[u8], key_id: &str) -> Result<Vec<u8>, CommandError>;
}

/// Supplies and rotates the keys an [`Encryptor`] encrypts under.
pub trait KeyStore: Send + Sync {
    /// The key id new encryptions should use.
    fn current_key(&self) -> String;
    /// Looks up a specific key by id, for decrypting older payloads.
    fn key(&self, id: &str) -> Option<Vec<u8>>;
    fn store(&self, key: Vec<u8>, id: &str);
    fn remove_expired_before(&self, ts: std::time::SystemTime);
}

/// A command's hook into field-level encryption: given the current key id,
/// encrypt sensitive fields in place before the handler sees them encrypted
/// on the way out, or decrypt them on the way back in.
pub trait Encryptable {
    fn encrypt_fields(&mut self, encryptor: &dyn Encryptor, key_id: &str) -> Result<(), CommandError>;
    fn decrypt_fields(&mut self, encryptor: &dyn Encryptor, key_store: &dyn KeyStore) -> Result<(), CommandError>;
}

type EncryptFn = Arc<dyn Fn(&mut Erased, &dyn Encryptor, &str) -> Result<(), CommandError> + Send + Sync>;
type DecryptFn = Arc<dyn Fn(&mut Erased, &dyn Encryptor, &dyn KeyStore) -> Result<(), CommandError> + Send + Sync>;

/// Encrypts a command's opted-in fields before `next`, decrypts its result
/// after. Command types opt in via [`EncryptionMiddleware::register`].
pub struct EncryptionMiddleware {
    encryptor: Arc<dyn Encryptor>,
    key_store: Arc<dyn KeyStore>,
    encryptors: RwLock<HashMap<TypeId, EncryptFn>>,
    decryptors: RwLock<HashMap<TypeId, DecryptFn>>,
}

impl EncryptionMiddleware {
    pub fn new(encryptor: Arc<dyn Encryptor>, key_store: Arc<dyn KeyStore>) -> Self {
        Self {
            encryptor,
            key_store,
            encryptors: RwLock::new(HashMap::new()),
            decryptors: RwLock::new(HashMap::new()),
        }
    }

    pub fn register<C>(&self)
    where
        C: Command + Encryptable + 'static,
    {
        self.encryptors.write().unwrap_or_else(|e| e.into_inner()).insert(
            TypeId::of::<C>(),
            Arc::new(|erased: &mut Erased, encryptor: &dyn Encryptor, key_id: &str| {
                erased
                    .downcast_mut::<C>()
                    .expect("keyed by TypeId::of::<C>()")
                    .encrypt_fields(encryptor, key_id)
            }),
        );
        self.decryptors.write().unwrap_or_else(|e| e.into_inner()).insert(
            TypeId::of::<C>(),
            Arc::new(|erased: &mut Erased, encryptor: &dyn Encryptor, key_store: &dyn KeyStore| {
                erased
                    .downcast_mut::<C>()
                    .expect("keyed by TypeId::of::<C>()")
                    .decrypt_fields(encryptor, key_store)
            }),
        );
    }
}

impl Middleware for EncryptionMiddleware {
    fn name(&self) -> &str {
        "encryption"
    }

    fn priority(&self) -> Priority {
        Priority::PreProcessing
    }

    fn execute<'a>(
        &'a self,
        mut command: Erased,
        _ctx: &'a Context,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Erased, CommandError>> {
        Box::pin(async move {
            let id = (*command).type_id();

            let encrypt = self.encryptors.read().unwrap_or_else(|e| e.into_inner()).get(&id).cloned();
            if let Some(encrypt) = encrypt {
                encrypt(&mut command, self.encryptor.as_ref(), &self.key_store.current_key())?;
            }

            let mut result = next.call(command).await?;

            let decrypt = self.decryptors.read().unwrap_or_else(|e| e.into_inner()).get(&id).cloned();
            if let Some(decrypt) = decrypt {
                decrypt(&mut result, self.encryptor.as_ref(), self.key_store.as_ref())?;
            }

            Ok(result)
        })
    }
}
