//! Codec registry.
//!
//! The [`Registry`] maps kinds to the codecs that serialize them, and the
//! `(origin, discriminator)` tags written to the stream back to the same
//! codecs. Entries are append-only: registering a kind or a tag twice is an
//! error, and nothing is ever removed.
//!
//! Registration is expected to finish before concurrent serialization starts;
//! lookups only take read locks.
//!
//! ## Registering a kind
//!
//! ```rust
//! use cachegraph::{
//!     DecodeContext, EncodeContext, Object, ObjectCodec, Registry, Result,
//! };
//!
//! #[derive(Debug, PartialEq)]
//! struct Point { x: i64, y: i64 }
//!
//! struct PointCodec;
//!
//! impl ObjectCodec for PointCodec {
//!     fn encode(&self, object: &Object, ctx: &mut EncodeContext<'_>) -> Result<()> {
//!         let point = object.downcast_ref::<Point>().expect("registered for Point");
//!         ctx.write(point.x)?;
//!         ctx.write(point.y)
//!     }
//!
//!     fn decode(&self, ctx: &mut DecodeContext<'_>) -> Result<Object> {
//!         let x = ctx.read()?.expect_type()?;
//!         let y = ctx.read()?.expect_type()?;
//!         Ok(Object::new(Point { x, y }))
//!     }
//! }
//!
//! let registry = Registry::new();
//! registry.register::<Point>("geometry", "Point", PointCodec).unwrap();
//! assert!(registry.register::<Point>("geometry", "Point2", PointCodec).is_err());
//! ```

use crate::bridge::SerdeCodec;
use crate::de::DecodeContext;
use crate::ser::EncodeContext;
use crate::value::{Kind, KindId, Object};
use crate::{Error, Result, Token};
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

/// Serialization logic for one kind.
///
/// `encode` writes nested values in a fixed order; `decode` must read them
/// back in exactly the same order. Any divergence desynchronizes the stream
/// and surfaces as a decode error.
pub trait ObjectCodec: Send + Sync + 'static {
    fn encode(&self, object: &Object, ctx: &mut EncodeContext<'_>) -> Result<()>;

    fn decode(&self, ctx: &mut DecodeContext<'_>) -> Result<Object>;
}

/// A type that knows how to write and read its own fields.
///
/// Register it with [`Registry::make_serializable`].
pub trait Serializable: Kind + Sized {
    fn serialize(&self, ctx: &mut EncodeContext<'_>) -> Result<()>;

    fn deserialize(ctx: &mut DecodeContext<'_>) -> Result<Self>;
}

/// Adapts a [`Serializable`] type to [`ObjectCodec`].
pub struct SerializableCodec<T>(PhantomData<fn() -> T>);

impl<T> SerializableCodec<T> {
    #[must_use]
    pub fn new() -> Self {
        SerializableCodec(PhantomData)
    }
}

impl<T> Default for SerializableCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Serializable> ObjectCodec for SerializableCodec<T> {
    fn encode(&self, object: &Object, ctx: &mut EncodeContext<'_>) -> Result<()> {
        let value = object
            .downcast_ref::<T>()
            .ok_or_else(|| Error::type_mismatch(KindId::of::<T>().name(), object.kind().name()))?;
        value.serialize(ctx)
    }

    fn decode(&self, ctx: &mut DecodeContext<'_>) -> Result<Object> {
        T::deserialize(ctx).map(Object::new)
    }
}

/// Second half of a tag, distinguishing kinds that share an origin.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Discriminator {
    Unnamed,
    Index(u32),
    Named(Arc<str>),
}

impl Discriminator {
    pub(crate) fn to_token(&self) -> Token {
        match self {
            Discriminator::Unnamed => Token::Null,
            Discriminator::Index(i) => Token::from(i64::from(*i)),
            Discriminator::Named(name) => Token::String(Arc::clone(name)),
        }
    }

    pub(crate) fn from_token(token: &Token) -> Option<Self> {
        match token {
            Token::Null => Some(Discriminator::Unnamed),
            Token::String(name) => Some(Discriminator::Named(Arc::clone(name))),
            other => other
                .as_integer()
                .and_then(|i| u32::try_from(i).ok())
                .map(Discriminator::Index),
        }
    }
}

impl fmt::Display for Discriminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discriminator::Unnamed => write!(f, "null"),
            Discriminator::Index(i) => write!(f, "{}", i),
            Discriminator::Named(name) => write!(f, "{}", name),
        }
    }
}

impl From<u32> for Discriminator {
    fn from(value: u32) -> Self {
        Discriminator::Index(value)
    }
}

impl From<&str> for Discriminator {
    fn from(value: &str) -> Self {
        Discriminator::Named(value.into())
    }
}

impl From<String> for Discriminator {
    fn from(value: String) -> Self {
        Discriminator::Named(value.into())
    }
}

impl<T: Into<Discriminator>> From<Option<T>> for Discriminator {
    fn from(value: Option<T>) -> Self {
        value.map_or(Discriminator::Unnamed, Into::into)
    }
}

/// The `(origin, discriminator)` pair naming a codec in the stream.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Tag {
    origin: Arc<str>,
    discriminator: Discriminator,
}

impl Tag {
    pub fn new(origin: impl Into<Arc<str>>, discriminator: impl Into<Discriminator>) -> Self {
        Tag {
            origin: origin.into(),
            discriminator: discriminator.into(),
        }
    }

    #[must_use]
    pub fn origin(&self) -> &Arc<str> {
        &self.origin
    }

    #[must_use]
    pub fn discriminator(&self) -> &Discriminator {
        &self.discriminator
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.origin, self.discriminator)
    }
}

/// A resolved registry entry: the tag to write and the codec to run.
#[derive(Clone)]
pub struct Registration {
    tag: Tag,
    codec: Arc<dyn ObjectCodec>,
}

impl Registration {
    #[must_use]
    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    #[must_use]
    pub fn codec(&self) -> &Arc<dyn ObjectCodec> {
        &self.codec
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("tag", &self.tag)
            .finish_non_exhaustive()
    }
}

enum KindEntry {
    Codec(Registration),
    NotSerializable,
}

/// Registers the kinds owned by one origin on first use.
pub type OriginLoader = Arc<dyn Fn(&Registry) -> Result<()> + Send + Sync>;

/// Table of codecs, keyed both by kind and by tag.
pub struct Registry {
    kinds: RwLock<HashMap<KindId, KindEntry>>,
    tags: RwLock<HashMap<Tag, Arc<dyn ObjectCodec>>>,
    loaders: RwLock<HashMap<Arc<str>, OriginLoader>>,
    loaded: Mutex<HashSet<Arc<str>>>,
}

static GLOBAL: OnceLock<Arc<Registry>> = OnceLock::new();

impl Registry {
    /// Creates a registry with every built-in kind registered.
    ///
    /// # Panics
    ///
    /// Panics if the built-in kinds conflict with each other; see
    /// [`Registry::try_new`] for the fallible form.
    #[must_use]
    pub fn new() -> Self {
        Registry::try_new().expect("built-in kinds have distinct kinds and tags")
    }

    /// Creates a registry with every built-in kind registered, returning the
    /// registration error instead of panicking.
    pub fn try_new() -> Result<Self> {
        let registry = Registry::empty();
        crate::builtins::register_builtins(&registry)?;
        Ok(registry)
    }

    /// Creates a registry with no kinds at all.
    #[must_use]
    pub fn empty() -> Self {
        Registry {
            kinds: RwLock::new(HashMap::new()),
            tags: RwLock::new(HashMap::new()),
            loaders: RwLock::new(HashMap::new()),
            loaded: Mutex::new(HashSet::new()),
        }
    }

    /// The process-wide registry, built with the built-ins on first access.
    pub fn global() -> Arc<Registry> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Registry::new())))
    }

    /// Binds `T` to `codec` under the tag `(origin, discriminator)`.
    ///
    /// # Errors
    ///
    /// Fails if `T` already has an entry, or if the tag is bound to a
    /// different codec.
    pub fn register<T: Kind>(
        &self,
        origin: impl Into<Arc<str>>,
        discriminator: impl Into<Discriminator>,
        codec: impl ObjectCodec,
    ) -> Result<()> {
        self.register_kind(KindId::of::<T>(), Tag::new(origin, discriminator), Arc::new(codec))
    }

    /// Binds `T` to an already shared codec, allowing several kinds to use
    /// one codec under one tag.
    pub fn register_shared<T: Kind>(
        &self,
        origin: impl Into<Arc<str>>,
        discriminator: impl Into<Discriminator>,
        codec: Arc<dyn ObjectCodec>,
    ) -> Result<()> {
        self.register_kind(KindId::of::<T>(), Tag::new(origin, discriminator), codec)
    }

    /// Registers a type implementing [`Serializable`].
    pub fn make_serializable<T: Serializable>(
        &self,
        origin: impl Into<Arc<str>>,
        discriminator: impl Into<Discriminator>,
    ) -> Result<()> {
        self.register::<T>(origin, discriminator, SerializableCodec::<T>::new())
    }

    /// Registers a serde type, encoded through its serde representation.
    pub fn register_serde<T>(
        &self,
        origin: impl Into<Arc<str>>,
        discriminator: impl Into<Discriminator>,
    ) -> Result<()>
    where
        T: Kind + Serialize + DeserializeOwned,
    {
        self.register::<T>(origin, discriminator, SerdeCodec::<T>::new())
    }

    pub fn register_kind(&self, kind: KindId, tag: Tag, codec: Arc<dyn ObjectCodec>) -> Result<()> {
        let mut kinds = self.kinds.write();
        let mut tags = self.tags.write();

        if kinds.contains_key(&kind) {
            return Err(Error::registration_conflict(&format!(
                "serializer for {}",
                kind
            )));
        }
        if let Some(existing) = tags.get(&tag) {
            if !Arc::ptr_eq(existing, &codec) {
                return Err(Error::registration_conflict(&format!(
                    "serializer for {}",
                    tag
                )));
            }
        }

        tracing::trace!(kind = kind.name(), %tag, "registered serializer");
        tags.insert(tag.clone(), Arc::clone(&codec));
        kinds.insert(kind, KindEntry::Codec(Registration { tag, codec }));
        Ok(())
    }

    /// Marks `T` as never serializable. Encoding a graph that contains it
    /// yields [`Serialized::NotSerializable`](crate::Serialized::NotSerializable).
    pub fn register_not_serializable<T: Kind>(&self) -> Result<()> {
        let kind = KindId::of::<T>();
        let mut kinds = self.kinds.write();
        if kinds.contains_key(&kind) {
            return Err(Error::registration_conflict(&format!(
                "serializer for {}",
                kind
            )));
        }
        tracing::trace!(kind = kind.name(), "registered as not serializable");
        kinds.insert(kind, KindEntry::NotSerializable);
        Ok(())
    }

    /// Installs the loader that registers the kinds of `origin` the first
    /// time a stream refers to it.
    pub fn register_loader<F>(&self, origin: impl Into<Arc<str>>, loader: F) -> Result<()>
    where
        F: Fn(&Registry) -> Result<()> + Send + Sync + 'static,
    {
        let origin = origin.into();
        let mut loaders = self.loaders.write();
        if loaders.contains_key(&origin) {
            return Err(Error::registration_conflict(&format!(
                "loader for {}",
                origin
            )));
        }
        loaders.insert(origin, Arc::new(loader));
        Ok(())
    }

    /// Finds the codec for `object`'s kind.
    ///
    /// # Errors
    ///
    /// [`Error::NoSerializer`] for unknown kinds, [`Error::NotSerializable`]
    /// for kinds marked with [`register_not_serializable`](Self::register_not_serializable).
    pub fn lookup_by_kind(&self, object: &Object) -> Result<Registration> {
        let kind = object.kind();
        match self.kinds.read().get(&kind) {
            Some(KindEntry::Codec(registration)) => Ok(registration.clone()),
            Some(KindEntry::NotSerializable) => Err(Error::not_serializable(kind.name())),
            None => Err(Error::no_serializer(kind.name())),
        }
    }

    /// Finds the codec bound to `tag`, running the origin's loader first if
    /// it has not run yet.
    pub fn lookup_by_tag(&self, tag: &Tag) -> Result<Arc<dyn ObjectCodec>> {
        self.ensure_loaded(tag.origin())?;
        self.tags
            .read()
            .get(tag)
            .cloned()
            .ok_or_else(|| Error::no_deserializer(&tag.to_string()))
    }

    #[must_use]
    pub fn is_registered<T: Kind>(&self) -> bool {
        self.kinds.read().contains_key(&KindId::of::<T>())
    }

    // The loaded set stays locked while the loader runs so concurrent
    // decoders cannot load one origin twice. Loaders must not decode.
    fn ensure_loaded(&self, origin: &Arc<str>) -> Result<()> {
        if origin.is_empty() {
            return Ok(());
        }
        let mut loaded = self.loaded.lock();
        if loaded.contains(origin) {
            return Ok(());
        }
        let loader = self.loaders.read().get(origin).cloned();
        if let Some(loader) = loader {
            tracing::debug!(%origin, "loading serializers for origin");
            loader(self)?;
        }
        loaded.insert(Arc::clone(origin));
        Ok(())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("kinds", &self.kinds.read().len())
            .field("tags", &self.tags.read().len())
            .field("loaders", &self.loaders.read().len())
            .finish()
    }
}
