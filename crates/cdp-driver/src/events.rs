use crate::ids::PageId;

/// Page lifecycle events emitted on the driver's broadcast bus. Popup
/// validation subscribes before triggering and waits for `Attached`.
#[derive(Clone, Debug)]
pub enum PageEvent {
    Opened {
        page: PageId,
        opener: Option<PageId>,
    },
    Attached {
        page: PageId,
    },
    Closed {
        page: PageId,
    },
}
