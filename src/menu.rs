use crate::Command;

/// Where a navigation action leads.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum Navigation {
    /// Return to the previous navigation state.
    Back,
    /// Relative page path including its query, e.g. `pillarsminion?minion=web1`.
    Path(String),
}

/// What happens when a menu item is chosen.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum MenuAction {
    /// Dispatch a new job (see `Jobs::run`).
    Run(Command),
    Navigate(Navigation),
}

/// Identifies an item inside the menu that created it.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct MenuItemId(usize);

#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct MenuItem {
    pub id: MenuItemId,
    pub label: String,
    pub action: MenuAction,
    pub visible: bool,
}

/// Menu-building capability handed to views.
pub trait MenuBuilder {
    /// Append a visible item.
    fn add_item(&mut self, label: &str, action: MenuAction) -> MenuItemId;

    /// Show or hide an item. Returns `false` when the item no longer exists.
    fn set_visible(&mut self, id: MenuItemId, visible: bool) -> bool;
}

/// In-memory drop-down menu.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DropDownMenu {
    items: Vec<MenuItem>,
    next_id: usize,
}

impl DropDownMenu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[MenuItem] {
        &self.items
    }

    pub fn visible_items(&self) -> impl Iterator<Item = &MenuItem> {
        self.items.iter().filter(|item| item.visible)
    }

    pub fn item(&self, id: MenuItemId) -> Option<&MenuItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// First item with this label, visible or not.
    pub fn find(&self, label: &str) -> Option<&MenuItem> {
        self.items.iter().find(|item| item.label == label)
    }

    /// The action behind a visible item; hidden or unknown items do nothing.
    pub fn activate(&self, id: MenuItemId) -> Option<&MenuAction> {
        self.item(id)
            .filter(|item| item.visible)
            .map(|item| &item.action)
    }

    /// Drop all items (view teardown). Ids handed out earlier stay invalid.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl MenuBuilder for DropDownMenu {
    fn add_item(&mut self, label: &str, action: MenuAction) -> MenuItemId {
        let id = MenuItemId(self.next_id);
        self.next_id += 1;
        self.items.push(MenuItem {
            id,
            label: label.to_string(),
            action,
            visible: true,
        });
        id
    }

    fn set_visible(&mut self, id: MenuItemId, visible: bool) -> bool {
        match self.items.iter_mut().find(|item| item.id == id) {
            Some(item) => {
                item.visible = visible;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::TargetType;

    #[test]
    fn hidden_items_cannot_be_activated() {
        let mut menu = DropDownMenu::new();
        let id = menu.add_item(
            "Kill job...",
            MenuAction::Run(Command::new(TargetType::Glob, "*", "saltutil.kill_job 1")),
        );
        assert!(menu.activate(id).is_some());

        assert!(menu.set_visible(id, false));
        assert!(menu.activate(id).is_none());
        assert_eq!(menu.visible_items().count(), 0);
        assert_eq!(menu.items().len(), 1);
    }

    #[test]
    fn cleared_menu_forgets_ids() {
        let mut menu = DropDownMenu::new();
        let first = menu.add_item("Show pillars", MenuAction::Navigate(Navigation::Back));
        menu.clear();
        assert!(!menu.set_visible(first, false));

        let second = menu.add_item("Show pillars", MenuAction::Navigate(Navigation::Back));
        assert_ne!(first, second);
        assert_eq!(
            menu.find("Show pillars").map(|item| item.id),
            Some(second)
        );
    }
}
