use serde::de::{DeserializeOwned, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

/// A JSON schema as declared by the service.
pub type Schema = Value;

/// A name-indexed collection that remembers the order in which the service declared its entries.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalogue<V> {
    entries: Vec<(String, V)>,
    index: HashMap<String, usize>,
}

impl<V> Default for Catalogue<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<V> Catalogue<V> {
    /// Returns the entry registered under `name`.
    pub fn get(&self, name: &str) -> Option<&V> {
        self.index.get(name).map(|&i| &self.entries[i].1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Iterates over the names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Iterates over `(name, entry)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn get_mut_or_insert_with(&mut self, name: &str, init: impl FnOnce() -> V) -> &mut V {
        let position = match self.index.get(name) {
            Some(&position) => position,
            None => {
                self.entries.push((name.to_string(), init()));
                self.index.insert(name.to_string(), self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        &mut self.entries[position].1
    }
}

impl<V> FromIterator<(String, V)> for Catalogue<V> {
    /// A repeated name keeps its first position and takes the last value.
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        let mut catalogue = Self::default();
        for (name, value) in iter {
            match catalogue.index.get(&name) {
                Some(&position) => catalogue.entries[position].1 = value,
                None => {
                    catalogue.index.insert(name.clone(), catalogue.entries.len());
                    catalogue.entries.push((name, value));
                }
            }
        }
        catalogue
    }
}

impl<'de, V> Deserialize<'de> for Catalogue<V>
where
    V: DeserializeOwned,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct CatalogueVisitor<V>(PhantomData<V>);

        impl<'de, V: DeserializeOwned> Visitor<'de> for CatalogueVisitor<V> {
            type Value = Catalogue<V>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of names to descriptions")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or_default());
                while let Some(entry) = map.next_entry::<String, V>()? {
                    entries.push(entry);
                }
                Ok(entries.into_iter().collect())
            }
        }

        deserializer.deserialize_map(CatalogueVisitor(PhantomData))
    }
}

/// The result payload of `JSONRPC.Introspect`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServiceDescription {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    id: Option<String>,
    version: String,
    #[serde(default)]
    methods: Catalogue<MethodDescription>,
    #[serde(default)]
    notifications: Catalogue<NotificationDescription>,
    #[serde(default)]
    types: Catalogue<Schema>,
}

impl ServiceDescription {
    /// The declared API version (e.g. `13.5.0`).
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// The schema identifier of the description document itself.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Methods keyed by their fully qualified name (`Namespace.Method`).
    pub fn methods(&self) -> &Catalogue<MethodDescription> {
        &self.methods
    }

    pub fn notifications(&self) -> &Catalogue<NotificationDescription> {
        &self.notifications
    }

    pub fn types(&self) -> &Catalogue<Schema> {
        &self.types
    }
}

/// A remote method: positional parameters and the schema of its result.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MethodDescription {
    #[serde(default)]
    pub description: Option<String>,
    /// Order is significant, it defines positional-argument binding.
    #[serde(default)]
    pub params: Vec<ParameterSchema>,
    #[serde(default)]
    pub returns: Option<Schema>,
}

/// A fire-and-forget message the service may push to its clients.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NotificationDescription {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub params: Vec<ParameterSchema>,
}

/// One declared parameter: the remote key under which an argument is sent, plus the schema the
/// argument is validated against.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub struct ParameterSchema {
    pub name: String,
    /// The full declared parameter object.
    pub schema: Schema,
}

impl TryFrom<Value> for ParameterSchema {
    type Error = String;

    fn try_from(schema: Value) -> Result<Self, Self::Error> {
        let name = schema
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| format!("parameter without a string 'name': {schema}"))?
            .to_string();

        Ok(Self { name, schema })
    }
}
