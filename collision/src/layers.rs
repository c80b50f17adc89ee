use num_traits::{One, PrimInt};

/// The default primitive storage for collision masks.
/// Layer enums backed by smaller sizes (u8/u16) are still possible when appropriate.
pub type MaskStorage = u32;

/// Trait implemented by collision layer enums.
///
/// The enum's discriminant (via `#[repr(u8)]`) determines the bit index.
/// You choose the backing integer type via the associated `Storage`.
pub trait LayerBit {
    type Storage: PrimInt;

    fn bit_index(&self) -> u8;

    fn mask(&self) -> Self::Storage {
        // NOTE: `bit_index()` must be < number of bits in `Storage`.
        Self::Storage::one() << (self.bit_index() as usize)
    }
}

/// A set of collision layers.
///
/// Static colliders carry a membership mask; queries carry a filter mask. A query sees a
/// collider when the two masks intersect.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct LayerMask<T: PrimInt = MaskStorage> {
    pub bits: T,
}

impl<T: PrimInt> Default for LayerMask<T> {
    fn default() -> Self {
        Self::all()
    }
}

impl<T: PrimInt> LayerMask<T> {
    pub fn new(bits: T) -> Self {
        Self { bits }
    }

    /// Mask matching every layer.
    pub fn all() -> Self {
        Self { bits: !T::zero() }
    }

    /// Mask matching nothing.
    pub fn none() -> Self {
        Self { bits: T::zero() }
    }

    pub fn from_layers<U: LayerBit<Storage = T> + Copy>(layers: &[U]) -> Self {
        let mut mask = Self::none();
        mask.add_many(layers);
        mask
    }

    /// True if the two masks share at least one layer.
    pub fn intersects(&self, other: Self) -> bool {
        (self.bits & other.bits) != T::zero()
    }

    // --- Single Layer Operations ---
    pub fn add<U: LayerBit<Storage = T>>(&mut self, layer: U) {
        self.bits = self.bits | layer.mask();
    }

    pub fn remove<U: LayerBit<Storage = T>>(&mut self, layer: U) {
        self.bits = self.bits & !layer.mask();
    }

    pub fn has<U: LayerBit<Storage = T>>(&self, layer: U) -> bool {
        (self.bits & layer.mask()) != T::zero()
    }

    // --- Bulk Operations ---
    pub fn add_many<U: LayerBit<Storage = T> + Copy>(&mut self, layers: &[U]) {
        for &layer in layers {
            self.add(layer);
        }
    }

    pub fn has_any<U: LayerBit<Storage = T> + Copy>(&self, layers: &[U]) -> bool {
        if layers.is_empty() {
            return false;
        }
        let combined = layers.iter().fold(T::zero(), |acc, l| acc | l.mask());
        (self.bits & combined) != T::zero()
    }

    pub fn clear(&mut self) {
        self.bits = T::zero();
    }
}

/// Collision mask type used by queries and colliders throughout the engine.
pub type CollisionMask = LayerMask<MaskStorage>;

/// Declare a layer enum and implement `LayerBit` for it.
///
/// Example:
/// ```rust
/// capsweep_collision::define_collision_layers!(GameLayer, u32, {
///     Terrain,
///     Props,
///     Agents,
/// });
/// ```
#[macro_export]
macro_rules! define_collision_layers {
    ($name:ident, $storage:ty, { $($variant:ident),* $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[repr(u8)]
        pub enum $name {
            $($variant),*
        }

        impl $crate::layers::LayerBit for $name {
            type Storage = $storage;

            fn bit_index(&self) -> u8 {
                *self as u8
            }
        }
    };
}

define_collision_layers!(Layer, MaskStorage, {
    Static,
    Terrain,
    Props,
    Agents,
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_remove_and_query_layers() {
        let mut mask = CollisionMask::none();
        assert!(!mask.has(Layer::Terrain));

        mask.add(Layer::Terrain);
        mask.add(Layer::Agents);
        assert!(mask.has(Layer::Terrain));
        assert!(mask.has_any(&[Layer::Props, Layer::Agents]));
        assert!(!mask.has_any(&[Layer::Props, Layer::Static]));

        mask.remove(Layer::Agents);
        assert!(!mask.has(Layer::Agents));

        mask.clear();
        assert_eq!(mask, CollisionMask::none());
    }

    #[test]
    fn masks_intersect_only_on_shared_layers() {
        let terrain = CollisionMask::from_layers(&[Layer::Terrain]);
        let props = CollisionMask::from_layers(&[Layer::Props]);

        assert!(!terrain.intersects(props));
        assert!(CollisionMask::all().intersects(terrain));
        assert!(!CollisionMask::none().intersects(CollisionMask::all()));
    }

    #[test]
    fn empty_layer_list_matches_nothing() {
        let empty: &[Layer] = &[];
        assert!(!CollisionMask::all().has_any(empty));
        assert_eq!(CollisionMask::from_layers(empty), CollisionMask::none());
    }
}
