use std::fmt;

/// Screen-space rectangle of a UI node, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Bounds {
    #[must_use]
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    #[must_use]
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    #[must_use]
    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    #[must_use]
    pub fn center_x(&self) -> i32 {
        self.left + self.width() / 2
    }

    #[must_use]
    pub fn center_y(&self) -> i32 {
        self.top + self.height() / 2
    }

    /// Parse the legacy `"left,top,right,bottom"` storage form.
    #[must_use]
    pub fn parse_csv(s: &str) -> Option<Self> {
        let mut parts = s.split(',').map(|p| p.trim().parse::<i32>());
        let left = parts.next()?.ok()?;
        let top = parts.next()?.ok()?;
        let right = parts.next()?.ok()?;
        let bottom = parts.next()?.ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self::new(left, top, right, bottom))
    }

    /// True when every edge of `other` is within `tolerance` pixels of this one.
    #[must_use]
    pub fn within_tolerance(&self, other: &Bounds, tolerance: i32) -> bool {
        (self.left - other.left).abs() <= tolerance
            && (self.top - other.top).abs() <= tolerance
            && (self.right - other.right).abs() <= tolerance
            && (self.bottom - other.bottom).abs() <= tolerance
    }
}

impl fmt::Display for Bounds {
    /// The canonical `[l,t][r,b]` form used by the `bounds` selector property
    /// and by element fingerprints.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{},{}][{},{}]",
            self.left, self.top, self.right, self.bottom
        )
    }
}

/// Read-only capability view of one node in an externally-owned UI tree.
///
/// Implementations are cheap handles (the platform owns node identity and
/// lifetime); the engine clones them freely during a matching pass and never
/// retains them afterwards.
pub trait UiNode: Clone {
    fn class_name(&self) -> Option<String>;
    /// Fully-qualified view id resource name, e.g. `com.app:id/button`.
    fn view_id(&self) -> Option<String>;
    fn text(&self) -> Option<String>;
    fn description(&self) -> Option<String>;
    fn clickable(&self) -> bool;
    fn visible(&self) -> bool;
    fn enabled(&self) -> bool;
    fn bounds(&self) -> Bounds;
    fn child_count(&self) -> usize;
    fn child(&self, index: usize) -> Option<Self>;
    fn parent(&self) -> Option<Self>;
    /// Identity comparison: two handles may be distinct values for the same
    /// underlying node.
    fn same_node(&self, other: &Self) -> bool;
    /// Invoke the node's click action. Returns whether the action succeeded.
    fn click(&self) -> bool;
}

/// Source of the live UI tree plus the synthetic-gesture escape hatch.
pub trait TreeProvider {
    type Node: UiNode;

    /// Root of the currently active window, if any.
    fn active_root(&self) -> Option<Self::Node>;

    /// Dispatch a single-point tap gesture at screen coordinates.
    fn dispatch_tap(&self, x: i32, y: i32) -> bool;
}
