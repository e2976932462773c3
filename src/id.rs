//! Code for handling IDs and typed indices.
//!
//! Products and suppliers are referred to by string IDs in input and output files. Inside the
//! optimisation they are referred to by position, using index types which cannot be mixed up:
//! an [`IndexedVec`] of supplier data can only be indexed with a [`SupplierIndex`].
use serde::Serialize;
use std::marker::PhantomData;
use std::ops::Index;

macro_rules! define_id_type {
    ($name:ident) => {
        #[derive(
            Clone, std::hash::Hash, PartialEq, Eq, serde::Deserialize, Debug, serde::Serialize,
        )]
        /// An ID type (e.g. `ProductID`, `SupplierID`)
        pub struct $name(pub std::rc::Rc<str>);

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(std::rc::Rc::from(s))
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(std::rc::Rc::from(s))
            }
        }

        impl $name {
            /// Create a new ID from a string slice
            pub fn new(id: &str) -> Self {
                $name(std::rc::Rc::from(id))
            }
        }
    };
}

define_id_type!(ProductID);
define_id_type!(SupplierID);

/// A zero-based position which can be used to index an [`IndexedVec`]
pub trait TypedIndex: Copy {
    /// Create the index from a raw position
    fn from_usize(index: usize) -> Self;

    /// The raw position
    fn get(self) -> usize;
}

macro_rules! define_index_type {
    ($name:ident) => {
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, std::hash::Hash, Serialize,
        )]
        /// A zero-based index type
        pub struct $name(pub usize);

        impl TypedIndex for $name {
            fn from_usize(index: usize) -> Self {
                $name(index)
            }

            fn get(self) -> usize {
                self.0
            }
        }
    };
}

define_index_type!(ProductIndex);
define_index_type!(SupplierIndex);
define_index_type!(Period);

impl Period {
    /// The period preceding this one, or `None` for the first period
    pub fn previous(self) -> Option<Period> {
        self.0.checked_sub(1).map(Period)
    }

    /// The one-based period number used in input and output files
    pub fn number(self) -> u32 {
        self.0 as u32 + 1
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// A vector which can only be indexed by one kind of [`TypedIndex`]
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedVec<I, T> {
    values: Vec<T>,
    index: PhantomData<I>,
}

impl<I: TypedIndex, T> IndexedVec<I, T> {
    /// Number of elements
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no elements
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over the valid indices in order
    pub fn indices(&self) -> impl Iterator<Item = I> + Clone + use<I, T> {
        (0..self.values.len()).map(I::from_usize)
    }

    /// Iterate over the values in index order
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.values.iter()
    }

    /// Iterate over index-value pairs
    pub fn iter_indexed(&self) -> impl Iterator<Item = (I, &T)> {
        self.values
            .iter()
            .enumerate()
            .map(|(i, value)| (I::from_usize(i), value))
    }

    /// Apply `f` to every value, keeping the index type
    pub fn map<U, F: FnMut(&T) -> U>(&self, f: F) -> IndexedVec<I, U> {
        self.values.iter().map(f).collect()
    }
}

impl<I, T> From<Vec<T>> for IndexedVec<I, T> {
    fn from(values: Vec<T>) -> Self {
        Self {
            values,
            index: PhantomData,
        }
    }
}

impl<I, T> FromIterator<T> for IndexedVec<I, T> {
    fn from_iter<It: IntoIterator<Item = T>>(iter: It) -> Self {
        Vec::from_iter(iter).into()
    }
}

impl<I: TypedIndex, T> Index<I> for IndexedVec<I, T> {
    type Output = T;

    fn index(&self, index: I) -> &T {
        &self.values[index.get()]
    }
}
