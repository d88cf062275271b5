//! Queue-family discovery.

use ash::vk;

/// Graphics and present queue families of an adapter.
///
/// The two may be the same family, in which case swapchain images are
/// owned exclusively; otherwise they are shared concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilyIndices {
    /// Pick graphics and present families from an adapter's family list.
    ///
    /// A single family that can do both is preferred. Otherwise the first
    /// graphics family is paired with the first family that can present.
    /// Returns `None` if either capability is missing.
    pub fn find(
        families: &[vk::QueueFamilyProperties],
        mut supports_present: impl FnMut(u32) -> bool,
    ) -> Option<Self> {
        let candidates: Vec<(u32, bool, bool)> = families
            .iter()
            .enumerate()
            .filter(|(_, family)| family.queue_count > 0)
            .map(|(i, family)| {
                let index = i as u32;
                let graphics = family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
                (index, graphics, supports_present(index))
            })
            .collect();

        for &(index, graphics, present) in &candidates {
            if graphics {
                tracing::debug!("Queue family {index} is suitable for graphics");
            }
            if present {
                tracing::debug!("Queue family {index} is suitable for presenting");
            }
        }

        if let Some(&(index, _, _)) = candidates.iter().find(|(_, g, p)| *g && *p) {
            return Some(Self {
                graphics: index,
                present: index,
            });
        }

        let graphics = candidates.iter().find(|(_, g, _)| *g)?.0;
        let present = candidates.iter().find(|(_, _, p)| *p)?.0;
        Some(Self { graphics, present })
    }

    /// Whether graphics and present use the same family.
    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }

    /// Distinct family indices, graphics first.
    pub fn unique(&self) -> Vec<u32> {
        if self.is_shared() {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }

    /// Sharing mode and family list for swapchain images.
    pub fn image_sharing(&self) -> (vk::SharingMode, Vec<u32>) {
        if self.is_shared() {
            (vk::SharingMode::EXCLUSIVE, Vec::new())
        } else {
            (vk::SharingMode::CONCURRENT, self.unique())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn single_family_does_both() {
        let families = [
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
        ];
        let indices = QueueFamilyIndices::find(&families, |_| true).unwrap();
        assert_eq!(indices, QueueFamilyIndices { graphics: 1, present: 1 });
        assert!(indices.is_shared());
        assert_eq!(indices.image_sharing(), (vk::SharingMode::EXCLUSIVE, vec![]));
    }

    #[test]
    fn combined_family_preferred_over_first_graphics() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::GRAPHICS),
        ];
        let indices = QueueFamilyIndices::find(&families, |i| i == 1).unwrap();
        assert_eq!(indices, QueueFamilyIndices { graphics: 1, present: 1 });
    }

    #[test]
    fn separate_families_share_concurrently() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::COMPUTE),
        ];
        let indices = QueueFamilyIndices::find(&families, |i| i == 1).unwrap();
        assert_eq!(indices, QueueFamilyIndices { graphics: 0, present: 1 });
        assert_eq!(
            indices.image_sharing(),
            (vk::SharingMode::CONCURRENT, vec![0, 1])
        );
    }

    #[test]
    fn missing_capability_yields_none() {
        let families = [family(vk::QueueFlags::COMPUTE)];
        assert!(QueueFamilyIndices::find(&families, |_| true).is_none());

        let families = [family(vk::QueueFlags::GRAPHICS)];
        assert!(QueueFamilyIndices::find(&families, |_| false).is_none());
    }

    #[test]
    fn empty_families_are_skipped() {
        let mut empty = family(vk::QueueFlags::GRAPHICS);
        empty.queue_count = 0;
        let families = [empty, family(vk::QueueFlags::GRAPHICS)];
        let indices = QueueFamilyIndices::find(&families, |_| true).unwrap();
        assert_eq!(indices.graphics, 1);
    }
}
