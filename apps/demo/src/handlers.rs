use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::json;
use slice_core::{Action, EffectContext, Handler, Operation, OperationSet, Payload};

pub struct Counter {
    pub latency: Duration,
}

impl Handler for Counter {
    type State = i64;

    fn default_state(&self) -> i64 {
        0
    }

    fn operations(&self) -> OperationSet<i64> {
        let latency = self.latency;
        OperationSet::<i64>::new()
            .transition("setCount", |count, payload| {
                payload.as_i64().unwrap_or(*count)
            })
            .constant("count", 0)
            .transition("increment", |count, payload| {
                count + payload.as_i64().unwrap_or(1)
            })
            .transition("decrement", |count, payload| {
                count - payload.as_i64().unwrap_or(1)
            })
            .replace_state("reset")
            .deferred("fetchRemote", move |ctx: EffectContext, payload: Payload| async move {
                let seed = payload.as_i64().context("fetchRemote expects a number")?;
                tokio::time::sleep(latency).await;
                Ok::<_, anyhow::Error>(vec![ctx.action("setCount", json!(seed * 10))])
            })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    #[default]
    All,
    Open,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: u64,
    pub title: String,
    pub done: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoList {
    pub items: Vec<Todo>,
    pub filter: Filter,
}

#[derive(Debug, Deserialize)]
struct NewTodo {
    title: String,
}

pub struct Todos {
    pub latency: Duration,
}

impl Handler for Todos {
    type State = TodoList;

    fn default_state(&self) -> TodoList {
        TodoList::default()
    }

    fn operations(&self) -> OperationSet<TodoList> {
        let latency = self.latency;
        OperationSet::<TodoList>::new()
            .with(
                "add",
                Operation::typed_transition(|list: &TodoList, todo: NewTodo| {
                    let mut next = list.clone();
                    let id = next.items.iter().map(|t| t.id).max().map_or(1, |max| max + 1);
                    next.items.push(Todo {
                        id,
                        title: todo.title,
                        done: false,
                    });
                    next
                }),
            )
            .with(
                "toggle",
                Operation::typed_transition(|list: &TodoList, id: u64| {
                    let mut next = list.clone();
                    if let Some(todo) = next.items.iter_mut().find(|t| t.id == id) {
                        todo.done = !todo.done;
                    }
                    next
                }),
            )
            .with(
                "set_filter",
                Operation::typed_transition(|list: &TodoList, filter: Filter| TodoList {
                    filter,
                    ..list.clone()
                }),
            )
            .declare("filter")
            .constant("clear", TodoList::default())
            .replace_state("replaceAll")
            .deferred("load", move |ctx: EffectContext, payload: Payload| async move {
                let titles: Vec<String> =
                    serde_json::from_value(payload).context("load expects a list of titles")?;
                tokio::time::sleep(latency).await;
                let items = titles
                    .into_iter()
                    .zip(1..)
                    .map(|(title, id)| Todo {
                        id,
                        title,
                        done: false,
                    })
                    .collect();
                let list = TodoList {
                    items,
                    filter: Filter::All,
                };
                Ok::<Vec<Action>, anyhow::Error>(vec![ctx.typed_action("replaceAll", list)?])
            })
    }
}

slice_core::facade! {
    pub struct CounterActions {
        set_count => "setCount",
        increment => "increment",
        decrement => "decrement",
        reset => "reset",
        fetch_remote => "fetchRemote",
    }
}

slice_core::facade! {
    pub struct TodoActions {
        add => "add",
        toggle => "toggle",
        set_filter => "set_filter",
        clear => "clear",
        load => "load",
    }
}
