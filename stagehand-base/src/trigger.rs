/// Identifies a handler registered on a [`Trigger`], for targeted removal.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct HandlerId(u64);

type Handler<T> = Box<dyn FnMut(&mut T) -> bool + Send>;

struct Registration<T> {
    id: HandlerId,
    owner: Option<String>,
    once: bool,
    handler: Handler<T>,
}

/// A plain observer list: the scene/game notification surface (`loaded`,
/// `asset_loaded`, `scene_changed`, ...) is built out of these.
///
/// Handlers return `true` to remove themselves after the call; handlers
/// registered with [`Trigger::add_once`] are removed after their first call
/// regardless of the return value. A handler cannot re-enter the trigger it
/// is registered on during `fire` (the trigger is exclusively borrowed), so
/// additions always take effect for the next `fire`.
pub struct Trigger<T> {
    registrations: Vec<Registration<T>>,
    next_id: u64,
    destroyed: bool,
}

impl<T> Default for Trigger<T> {
    fn default() -> Self {
        Trigger::new()
    }
}

impl<T> Trigger<T> {
    pub fn new() -> Self {
        Trigger {
            registrations: Vec::new(),
            next_id: 1,
            destroyed: false,
        }
    }

    pub fn add<F>(
        &mut self,
        handler: F,
    ) -> HandlerId
    where
        F: FnMut(&mut T) -> bool + Send + 'static,
    {
        self.register(None, false, Box::new(handler))
    }

    /// Registers a handler that is removed after its first invocation.
    pub fn add_once<F>(
        &mut self,
        handler: F,
    ) -> HandlerId
    where
        F: FnMut(&mut T) -> bool + Send + 'static,
    {
        self.register(None, true, Box::new(handler))
    }

    /// Registers a handler tagged with an owner name so a collaborator can
    /// drop all of its handlers at once with [`Trigger::remove_by_owner`].
    pub fn add_with_owner<F>(
        &mut self,
        owner: &str,
        handler: F,
    ) -> HandlerId
    where
        F: FnMut(&mut T) -> bool + Send + 'static,
    {
        self.register(Some(owner.to_string()), false, Box::new(handler))
    }

    fn register(
        &mut self,
        owner: Option<String>,
        once: bool,
        handler: Handler<T>,
    ) -> HandlerId {
        assert!(!self.destroyed, "add on a destroyed trigger");
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        self.registrations.push(Registration {
            id,
            owner,
            once,
            handler,
        });
        id
    }

    pub fn remove(
        &mut self,
        id: HandlerId,
    ) -> bool {
        let before = self.registrations.len();
        self.registrations.retain(|r| r.id != id);
        self.registrations.len() != before
    }

    pub fn remove_by_owner(
        &mut self,
        owner: &str,
    ) -> usize {
        let before = self.registrations.len();
        self.registrations
            .retain(|r| r.owner.as_deref() != Some(owner));
        before - self.registrations.len()
    }

    pub fn handler_count(&self) -> usize {
        self.registrations.len()
    }

    /// Invokes every registered handler in registration order.
    pub fn fire(
        &mut self,
        arg: &mut T,
    ) {
        if self.destroyed {
            return;
        }
        let mut index = 0;
        while index < self.registrations.len() {
            let registration = &mut self.registrations[index];
            let remove = (registration.handler)(arg) || registration.once;
            if remove {
                self.registrations.remove(index);
            } else {
                index += 1;
            }
        }
    }

    pub fn destroy(&mut self) {
        self.registrations.clear();
        self.destroyed = true;
    }

    pub fn destroyed(&self) -> bool {
        self.destroyed
    }
}
