use crate::error::HookError;
use crate::shape::Capability;
use crate::value::Value;

/// Native conversion hook, callable through a shared borrow.
pub trait ToUnstructured {
    fn to_unstructured(&self) -> Result<Value, HookError>;
}

/// Native conversion hook that needs exclusive access to the receiver.
///
/// When the converter only holds a shared borrow it calls the hook on an
/// addressable copy instead, so implementors must also be `Clone` when
/// derived.
pub trait ToUnstructuredMut {
    fn to_unstructured_mut(&mut self) -> Result<Value, HookError>;
}

/// Text-marshal hook: JSON bytes, parsed back into a `Value` by the converter.
pub trait MarshalJson {
    fn marshal_json(&self) -> Result<Vec<u8>, HookError>;
}

/// Text-marshal hook that needs exclusive access to the receiver.
pub trait MarshalJsonMut {
    fn marshal_json_mut(&mut self) -> Result<Vec<u8>, HookError>;
}

/// Hook class requested from `Reflect::invoke` / `Reflect::invoke_mut`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    Native,
    TextMarshal,
}

/// Raw result of a hook call.
#[derive(Debug, Clone, PartialEq)]
pub enum HookOutput {
    Value(Value),
    Json(Vec<u8>),
}

/// How a hook's receiver has to be borrowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Receiver {
    /// Copy receiver: callable on any value.
    Shared,
    /// Reference receiver: needs an addressable value.
    Exclusive,
}

/// Detected hooks of a type. At most one class is ever used: the text-marshal
/// hook is only recorded when there is no native hook.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct HookSet {
    pub native: Option<Receiver>,
    pub text_marshal: Option<Receiver>,
}

impl HookSet {
    pub fn is_empty(&self) -> bool {
        self.native.is_none() && self.text_marshal.is_none()
    }

    /// The hook the converter should call, if any.
    pub fn preferred(&self) -> Option<(Hook, Receiver)> {
        if let Some(receiver) = self.native {
            return Some((Hook::Native, receiver));
        }
        self.text_marshal
            .map(|receiver| (Hook::TextMarshal, receiver))
    }
}

/// Work out which hooks a type exposes from its declared capabilities.
///
/// A shared-receiver hook also covers exclusive access, so it wins when a
/// type declares both forms.
pub fn detect(capabilities: &[Capability]) -> HookSet {
    let has = |capability| capabilities.contains(&capability);

    let native = receiver_for(
        has(Capability::ToUnstructured),
        has(Capability::ToUnstructuredMut),
    );
    let text_marshal = if native.is_some() {
        None
    } else {
        receiver_for(
            has(Capability::MarshalJson),
            has(Capability::MarshalJsonMut),
        )
    };

    HookSet {
        native,
        text_marshal,
    }
}

fn receiver_for(shared: bool, exclusive: bool) -> Option<Receiver> {
    match (shared, exclusive) {
        (true, _) => Some(Receiver::Shared),
        (false, true) => Some(Receiver::Exclusive),
        (false, false) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nothing_declared() {
        let hooks = detect(&[]);
        assert!(hooks.is_empty());
        assert_eq!(hooks.preferred(), None);
    }

    #[test]
    fn native_hook_hides_text_marshal() {
        let hooks = detect(&[Capability::MarshalJson, Capability::ToUnstructuredMut]);
        assert_eq!(hooks.native, Some(Receiver::Exclusive));
        assert_eq!(hooks.text_marshal, None);
        assert_eq!(hooks.preferred(), Some((Hook::Native, Receiver::Exclusive)));
    }

    #[test]
    fn shared_receiver_wins_over_exclusive() {
        let hooks = detect(&[Capability::MarshalJsonMut, Capability::MarshalJson]);
        assert_eq!(hooks.text_marshal, Some(Receiver::Shared));
        assert_eq!(hooks.preferred(), Some((Hook::TextMarshal, Receiver::Shared)));
    }
}
