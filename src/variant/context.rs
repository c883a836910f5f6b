// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Providers for the working variant index.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

const UNSET: usize = usize::MAX;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(0);

thread_local! {
    /// Working variant of the current thread, for each thread-local context.
    static WORKING_VARIANTS: RefCell<HashMap<u64, usize>> = RefCell::new(HashMap::new());
}

/// Where the working variant index of a network is kept.
///
/// With `Shared`, every thread sees the same working variant.  With
/// `ThreadLocal`, each thread pins its own, which lets several readers work
/// on different variants of the same network at once.
pub(crate) enum VariantContext {
    Shared(AtomicUsize),
    ThreadLocal { id: u64 },
}

impl VariantContext {
    pub(crate) fn shared(index: Option<usize>) -> Self {
        Self::Shared(AtomicUsize::new(index.unwrap_or(UNSET)))
    }

    pub(crate) fn thread_local(index: Option<usize>) -> Self {
        let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
        let context = Self::ThreadLocal { id };
        if let Some(index) = index {
            context.set_variant_index(index);
        }
        context
    }

    pub(crate) fn is_thread_local(&self) -> bool {
        matches!(self, Self::ThreadLocal { .. })
    }

    /// Returns the working variant index, if one is set.
    pub(crate) fn variant_index(&self) -> Option<usize> {
        match self {
            Self::Shared(index) => match index.load(Ordering::Acquire) {
                UNSET => None,
                index => Some(index),
            },
            Self::ThreadLocal { id } => {
                WORKING_VARIANTS.with(|variants| variants.borrow().get(id).copied())
            }
        }
    }

    pub(crate) fn set_variant_index(&self, index: usize) {
        match self {
            Self::Shared(current) => current.store(index, Ordering::Release),
            Self::ThreadLocal { id } => WORKING_VARIANTS.with(|variants| {
                variants.borrow_mut().insert(*id, index);
            }),
        }
    }

    /// Unsets the working variant if it is `index`.
    pub(crate) fn reset_if_variant_index_is(&self, index: usize) {
        match self {
            Self::Shared(current) => {
                let _ = current.compare_exchange(index, UNSET, Ordering::AcqRel, Ordering::Acquire);
            }
            Self::ThreadLocal { id } => WORKING_VARIANTS.with(|variants| {
                let mut variants = variants.borrow_mut();
                if variants.get(id) == Some(&index) {
                    variants.remove(id);
                }
            }),
        }
    }
}

impl Drop for VariantContext {
    fn drop(&mut self) {
        if let Self::ThreadLocal { id } = self {
            // Other threads' entries are dropped with their thread.
            let _ = WORKING_VARIANTS.try_with(|variants| variants.borrow_mut().remove(id));
        }
    }
}
