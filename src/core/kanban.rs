use crate::core::api::Column;

/// "Move this task to that column", however it was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveIntent {
    pub task_id: String,
    pub column: Column,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragEvent {
    Start { task_id: String },
    Over { column: Column },
    Leave { column: Column },
    Drop { column: Column },
    End,
    /// Non-drag fallback from a card's "move to" menu.
    MenuMove { task_id: String, column: Column },
}

/// Pointer-drag state. Only `transfer` affects what a drop does; the
/// dragging and hover flags are purely visual.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DragState {
    transfer: Option<String>,
    hover: Option<Column>,
}

impl DragState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dragging(&self) -> Option<&str> {
        self.transfer.as_deref()
    }

    pub fn hover(&self) -> Option<Column> {
        self.hover
    }

    pub fn reduce(&mut self, event: DragEvent) -> Option<MoveIntent> {
        match event {
            DragEvent::Start { task_id } => {
                self.transfer = Some(task_id);
                None
            }
            DragEvent::Over { column } => {
                self.hover = Some(column);
                None
            }
            DragEvent::Leave { column } => {
                if self.hover == Some(column) {
                    self.hover = None;
                }
                None
            }
            DragEvent::Drop { column } => {
                self.hover = None;
                self.transfer
                    .take()
                    .map(|task_id| MoveIntent { task_id, column })
            }
            DragEvent::End => {
                self.transfer = None;
                self.hover = None;
                None
            }
            DragEvent::MenuMove { task_id, column } => Some(MoveIntent { task_id, column }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drag_and_drop_emits_one_move() {
        let mut drag = DragState::new();
        assert_eq!(
            drag.reduce(DragEvent::Start {
                task_id: "t1".into()
            }),
            None
        );
        assert_eq!(drag.dragging(), Some("t1"));

        drag.reduce(DragEvent::Over {
            column: Column::Complete,
        });
        drag.reduce(DragEvent::Leave {
            column: Column::Complete,
        });
        drag.reduce(DragEvent::Over {
            column: Column::Blocked,
        });
        assert_eq!(drag.hover(), Some(Column::Blocked));

        let intent = drag.reduce(DragEvent::Drop {
            column: Column::Blocked,
        });
        assert_eq!(
            intent,
            Some(MoveIntent {
                task_id: "t1".into(),
                column: Column::Blocked
            })
        );
        assert_eq!(drag.hover(), None);
        assert_eq!(drag.reduce(DragEvent::End), None);
        assert_eq!(drag.dragging(), None);
    }

    #[test]
    fn drop_without_transfer_is_a_no_op() {
        let mut drag = DragState::new();
        drag.reduce(DragEvent::Over {
            column: Column::Todo,
        });
        assert_eq!(
            drag.reduce(DragEvent::Drop {
                column: Column::Todo
            }),
            None
        );
    }

    #[test]
    fn menu_move_matches_drop() {
        let mut a = DragState::new();
        a.reduce(DragEvent::Start {
            task_id: "t9".into(),
        });
        let dropped = a.reduce(DragEvent::Drop {
            column: Column::InProgress,
        });

        let mut b = DragState::new();
        let menu = b.reduce(DragEvent::MenuMove {
            task_id: "t9".into(),
            column: Column::InProgress,
        });
        assert_eq!(dropped, menu);
    }

    #[test]
    fn leaving_another_column_keeps_hover() {
        let mut drag = DragState::new();
        drag.reduce(DragEvent::Over {
            column: Column::Todo,
        });
        drag.reduce(DragEvent::Leave {
            column: Column::Blocked,
        });
        assert_eq!(drag.hover(), Some(Column::Todo));
    }
}
