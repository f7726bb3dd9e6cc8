// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::{Rc, Weak};

type CancelCallback = Box<dyn FnMut(bool)>;
type PendingAction = Box<dyn FnOnce()>;

/// What the navigation guard decided for one tab-switch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavDecision {
    Proceed,
    Intercept,
}

#[derive(Default)]
struct EditState {
    active_editor: Option<String>,
    pending_action: Option<PendingAction>,
    discard_dialog_visible: bool,
    force_skip: bool,
    cancel_callbacks: HashMap<String, CancelCallback>,
    nav_guard_enabled: bool,
    nested_groups: BTreeSet<String>,
}

/// Owning end of the edit-state context. One scope per component tree;
/// dropping it invalidates every handle cloned from it.
pub struct EditScope {
    inner: Rc<RefCell<EditState>>,
}

impl EditScope {
    pub fn provide() -> Self {
        Self {
            inner: Rc::new(RefCell::new(EditState {
                nav_guard_enabled: true,
                ..EditState::default()
            })),
        }
    }

    pub fn handle(&self) -> EditHandle {
        EditHandle {
            inner: Rc::downgrade(&self.inner),
        }
    }
}

/// Shared handle to the edit-state slot. All access is synchronous on the
/// UI thread; the single-slot invariant is the only locking discipline.
#[derive(Clone)]
pub struct EditHandle {
    inner: Weak<RefCell<EditState>>,
}

impl EditHandle {
    fn upgrade(&self) -> Result<Rc<RefCell<EditState>>> {
        self.inner
            .upgrade()
            .ok_or_else(|| anyhow!("edit state used outside a providing scope"))
    }

    pub fn active(&self) -> Result<Option<String>> {
        Ok(self.upgrade()?.borrow().active_editor.clone())
    }

    pub fn is_editing(&self, id: &str) -> Result<bool> {
        Ok(self.upgrade()?.borrow().active_editor.as_deref() == Some(id))
    }

    pub fn is_any_editing(&self) -> Result<bool> {
        Ok(self.upgrade()?.borrow().active_editor.is_some())
    }

    /// Claims the single edit slot. No guard against overwriting another
    /// active id; callers check `is_any_editing` first.
    pub fn set_active(&self, id: &str) -> Result<()> {
        self.upgrade()?.borrow_mut().active_editor = Some(id.to_owned());
        Ok(())
    }

    pub fn clear_active(&self) -> Result<()> {
        self.upgrade()?.borrow_mut().active_editor = None;
        Ok(())
    }

    /// One-shot bypass for the next unsaved-changes prompt, used for
    /// programmatic navigation that must not stop to ask.
    pub fn skip_next_confirmation(&self) -> Result<()> {
        self.upgrade()?.borrow_mut().force_skip = true;
        Ok(())
    }

    pub fn discard_dialog_visible(&self) -> Result<bool> {
        Ok(self.upgrade()?.borrow().discard_dialog_visible)
    }

    /// Defers `action` behind the discard-confirmation dialog, or runs it
    /// immediately when the one-shot skip flag is set (consuming the flag).
    pub fn handle_unsaved_changes(&self, action: impl FnOnce() + 'static) -> Result<()> {
        let inner = self.upgrade()?;
        {
            let mut state = inner.borrow_mut();
            if state.force_skip {
                state.force_skip = false;
            } else {
                state.pending_action = Some(Box::new(action));
                state.discard_dialog_visible = true;
                return Ok(());
            }
        }
        // Run outside the borrow; the action may call back into this handle.
        action();
        Ok(())
    }

    /// User confirmed the discard: run the pending action exactly once,
    /// then release the edit slot.
    pub fn confirm_discard(&self) -> Result<()> {
        let inner = self.upgrade()?;
        let pending = {
            let mut state = inner.borrow_mut();
            state.discard_dialog_visible = false;
            state.pending_action.take()
        };
        if let Some(action) = pending {
            action();
        }
        inner.borrow_mut().active_editor = None;
        Ok(())
    }

    /// User kept editing: drop the pending action uninvoked, leave the
    /// active editor in place.
    pub fn cancel_discard(&self) -> Result<()> {
        let inner = self.upgrade()?;
        let mut state = inner.borrow_mut();
        state.discard_dialog_visible = false;
        state.pending_action = None;
        Ok(())
    }

    pub fn register_cancel(&self, id: &str, callback: impl FnMut(bool) + 'static) -> Result<()> {
        self.upgrade()?
            .borrow_mut()
            .cancel_callbacks
            .insert(id.to_owned(), Box::new(callback));
        Ok(())
    }

    pub fn unregister_cancel(&self, id: &str) -> Result<()> {
        self.upgrade()?.borrow_mut().cancel_callbacks.remove(id);
        Ok(())
    }

    /// Asks the currently-editing component to clean up, via its registered
    /// cancel callback. Returns whether a callback was found and invoked.
    pub fn trigger_cancel_edit(&self, skip_confirmation: bool) -> Result<bool> {
        let inner = self.upgrade()?;
        let (id, mut callback, effective_skip) = {
            let mut state = inner.borrow_mut();
            let Some(id) = state.active_editor.clone() else {
                return Ok(false);
            };
            let Some(callback) = state.cancel_callbacks.remove(&id) else {
                return Ok(false);
            };
            (id, callback, skip_confirmation || state.force_skip)
        };

        callback(effective_skip);

        // Re-register unless the callback replaced itself while running.
        let mut state = inner.borrow_mut();
        state.cancel_callbacks.entry(id).or_insert(callback);
        Ok(true)
    }

    pub fn set_nav_guard_enabled(&self, enabled: bool) -> Result<()> {
        self.upgrade()?.borrow_mut().nav_guard_enabled = enabled;
        Ok(())
    }

    /// Nested tab groups (tab strips inside an editing panel) are exempt
    /// from interception.
    pub fn register_nested_group(&self, group: &str) -> Result<()> {
        self.upgrade()?
            .borrow_mut()
            .nested_groups
            .insert(group.to_owned());
        Ok(())
    }

    pub fn unregister_nested_group(&self, group: &str) -> Result<()> {
        self.upgrade()?.borrow_mut().nested_groups.remove(group);
        Ok(())
    }

    /// Decides one navigation attempt: intercepted while an edit is in
    /// progress, unless the guard is disabled or the target group is
    /// registered as nested.
    pub fn guard_navigation(&self, target_group: &str) -> Result<NavDecision> {
        let inner = self.upgrade()?;
        let state = inner.borrow();
        if !state.nav_guard_enabled
            || state.active_editor.is_none()
            || state.nested_groups.contains(target_group)
        {
            return Ok(NavDecision::Proceed);
        }
        Ok(NavDecision::Intercept)
    }
}
