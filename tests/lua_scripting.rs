use std::rc::Rc;

use hashcall::codec::{Value, Vector3};
use hashcall::invoker::memory::MemoryHost;
use hashcall::natives::vehicle;
use hashcall::resource::Resource;
use hashcall::scripting::ScriptHost;

fn script_host() -> ScriptHost<MemoryHost> {
    let host = MemoryHost::new("lua-test").with_convars([("race_laps", "3")]);
    let resource = Rc::new(Resource::new("lua-test", host));
    ScriptHost::new(resource).unwrap()
}

fn global<T: mlua::FromLua>(scripts: &ScriptHost<MemoryHost>, name: &str) -> T {
    scripts.lua().globals().get(name).unwrap()
}

#[test]
fn test_namespaced_and_legacy_natives() {
    let scripts = script_host();
    let car = scripts
        .resource()
        .with_host(|h| h.spawn_vehicle(Vector3::new(1.0, 2.0, 3.0)))
        .unwrap();
    scripts.lua().globals().set("car", car.raw()).unwrap();

    scripts
        .exec(
            r#"
            entity.set_entity_heading(car, 45.0)
            heading = GetEntityHeading(car)
            local pos = GetEntityCoords(car)
            x, z = pos.x, pos.z
            laps = convar.get_convar_int("race_laps", 1)
            name = GetCurrentResourceName()
            "#,
            "natives",
        )
        .unwrap();

    assert_eq!(global::<f32>(&scripts, "heading"), 45.0);
    assert_eq!(global::<f32>(&scripts, "x"), 1.0);
    assert_eq!(global::<f32>(&scripts, "z"), 3.0);
    assert_eq!(global::<i64>(&scripts, "laps"), 3);
    assert_eq!(global::<String>(&scripts, "name"), "lua-test");
}

#[test]
fn test_invoke_native_by_hash_returns_tuples() {
    let scripts = script_host();
    let car = scripts
        .resource()
        .with_host(|h| h.spawn_vehicle(Vector3::default()))
        .unwrap();
    let globals = scripts.lua().globals();
    globals.set("car", car.raw()).unwrap();
    globals.set("GET_COLOURS", vehicle::GET_VEHICLE_COLOURS.id.0).unwrap();
    globals.set("SET_COLOURS", vehicle::SET_VEHICLE_COLOURS.id.0).unwrap();

    scripts
        .exec(
            r#"
            invokeNative(SET_COLOURS, car, 12, 34)
            primary, secondary = invokeNative(GET_COLOURS, car)
            "#,
            "raw",
        )
        .unwrap();
    assert_eq!(global::<i64>(&scripts, "primary"), 12);
    assert_eq!(global::<i64>(&scripts, "secondary"), 34);
}

#[test]
fn test_native_errors_become_lua_errors() {
    let scripts = script_host();
    scripts
        .exec(
            r#"
            local err
            ok_missing, err = pcall(GetEntityCoords, 999)
            err_missing = tostring(err)
            ok_type = pcall(SetEntityHeading, 1, "north")
            ok_arity = pcall(GetEntityCoords)
            "#,
            "errors",
        )
        .unwrap();
    assert!(!global::<bool>(&scripts, "ok_missing"));
    assert!(global::<String>(&scripts, "err_missing").contains("GET_ENTITY_COORDS"));
    assert!(!global::<bool>(&scripts, "ok_type"));
    assert!(!global::<bool>(&scripts, "ok_arity"));
}

#[test]
fn test_events_on_off_once() {
    let scripts = script_host();
    scripts
        .exec(
            r#"
            count, once_count, last = 0, 0, nil
            local function bump(v) count = count + 1; last = v end
            on("tick", bump)
            once("tick", function() once_count = once_count + 1 end)
            emit("tick", { n = 1 })
            emit("tick", { n = 2 })
            removed = off("tick", bump)
            removed_again = off("tick", bump)
            emit("tick", { n = 3 })
            "#,
            "events",
        )
        .unwrap();

    assert_eq!(global::<i64>(&scripts, "count"), 2);
    assert_eq!(global::<i64>(&scripts, "once_count"), 1);
    assert!(global::<bool>(&scripts, "removed"));
    assert!(!global::<bool>(&scripts, "removed_again"));
    let last: Value = global(&scripts, "last");
    assert_eq!(last.get("n"), Some(&Value::Int(2)));
}

#[test]
fn test_cancel_event_from_lua() {
    let scripts = script_host();
    scripts
        .exec(
            r#"
            on("chat", function() cancelEvent() end)
            on("chat", function() seen_canceled = wasEventCanceled() end)
            canceled = emit("chat", "hi")
            outside_ok = pcall(cancelEvent)
            "#,
            "cancel",
        )
        .unwrap();
    assert!(global::<bool>(&scripts, "canceled"));
    assert!(global::<bool>(&scripts, "seen_canceled"));
    assert!(!global::<bool>(&scripts, "outside_ok"));
}

#[test]
fn test_client_events_carry_source() {
    let scripts = script_host();
    let alice = scripts
        .resource()
        .with_host(|h| h.add_player("alice"))
        .unwrap();
    scripts
        .exec(
            r#"
            onClient("garage:park", function(slot)
              parked_by = getEventSource()
              parked_slot = slot
              emitClient("garage:ok", parked_by, slot)
            end)
            "#,
            "client",
        )
        .unwrap();

    scripts
        .resource()
        .with_host(|h| h.queue_net_event("garage:park", alice, &[Value::Int(2)]))
        .unwrap();
    let report = scripts.resource().pump().unwrap();
    assert!(report.failures.is_empty());

    assert_eq!(global::<i64>(&scripts, "parked_by"), alice.raw() as i64);
    assert_eq!(global::<i64>(&scripts, "parked_slot"), 2);
    let sent = scripts
        .resource()
        .with_host(|h| h.sent_client_events().to_vec())
        .unwrap();
    assert_eq!(sent[0].name, "garage:ok");
    assert_eq!(sent[0].args, vec![Value::Int(2)]);
}

#[test]
fn test_state_bags_and_convars_from_lua() {
    let scripts = script_host();
    scripts
        .exec(
            r#"
            changes = {}
            cookie = addStateBagChangeHandler("weather", "", function(bag, key, value, _, replicated)
              changes[#changes + 1] = bag .. "." .. key .. "=" .. tostring(value)
              before = getStateBagValue(bag, key)
            end)
            setStateBagValue("global", "weather", "rain", true)

            convar_hits = 0
            addConvarChangeListener("race_*", function(name)
              convar_hits = convar_hits + 1
            end)
            SetConvar("race_laps", "5")
            "#,
            "bags",
        )
        .unwrap();

    scripts.resource().pump().unwrap();
    scripts
        .exec(
            r#"
            after = getStateBagValue("global", "weather")
            first_change = changes[1]
            removed = removeStateBagChangeHandler(cookie)
            "#,
            "bags-after",
        )
        .unwrap();

    assert_eq!(global::<String>(&scripts, "first_change"), "global.weather=rain");
    assert_eq!(global::<Option<String>>(&scripts, "before"), None);
    assert_eq!(global::<String>(&scripts, "after"), "rain");
    assert!(global::<bool>(&scripts, "removed"));
    assert_eq!(global::<i64>(&scripts, "convar_hits"), 1);
}

#[test]
fn test_vector3_userdata() {
    let scripts = script_host();
    scripts
        .exec(
            r#"
            local a = vector3(1, 2, 3)
            local b = vector3(1, 1, 1)
            diff = a - b
            same = (a == vector3(1, 2, 3))
            text = tostring(b)
            "#,
            "vectors",
        )
        .unwrap();
    let diff: Vector3 = global(&scripts, "diff");
    assert_eq!(diff, Vector3::new(0.0, 1.0, 2.0));
    assert!(global::<bool>(&scripts, "same"));
    assert_eq!(global::<String>(&scripts, "text"), "vector3(1, 1, 1)");
}

#[test]
fn test_load_dir_order_and_failures() {
    let dir = std::env::temp_dir().join(format!("hashcall_scripts_{}", std::process::id()));
    let nested = dir.join("zones");
    std::fs::create_dir_all(&nested).unwrap();
    std::fs::write(dir.join("main.lua"), "order = { 'main' }").unwrap();
    std::fs::write(dir.join("a_broken.lua"), "this is not lua").unwrap();
    std::fs::write(dir.join("b_extra.lua"), "order[#order + 1] = 'extra'").unwrap();
    std::fs::write(nested.join("zone.lua"), "order[#order + 1] = 'zone'").unwrap();
    std::fs::write(dir.join(".hidden.lua"), "order[#order + 1] = 'hidden'").unwrap();
    std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

    let scripts = script_host();
    let loaded = scripts.load_dir(&dir).unwrap();
    assert_eq!(loaded, 3);

    let order: Vec<String> = global(&scripts, "order");
    assert_eq!(order, vec!["main", "extra", "zone"]);

    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn test_stop_drops_lua_handlers() {
    let scripts = script_host();
    scripts
        .exec(
            r#"
            hits = 0
            on("ping", function() hits = hits + 1 end)
            onClient("ping", function() hits = hits + 1 end)
            "#,
            "stop",
        )
        .unwrap();
    assert_eq!(scripts.lua_handler_count(), 2);

    scripts.stop();
    assert_eq!(scripts.lua_handler_count(), 0);
    scripts.exec("emit('ping')", "after-stop").unwrap();
    assert_eq!(global::<i64>(&scripts, "hits"), 0);
}

#[test]
fn test_fired_once_handlers_are_released() {
    let scripts = script_host();
    scripts
        .exec(
            r#"
            for _ = 1, 100 do
              once("tick", function() end)
              emit("tick")
            end
            "#,
            "once-cycles",
        )
        .unwrap();
    assert_eq!(scripts.lua_handler_count(), 0);
    assert_eq!(
        scripts
            .resource()
            .events()
            .listener_count(hashcall::events::Scope::Local, "tick"),
        0
    );
}

#[test]
fn test_off_after_once_fired_removes_live_handler() {
    let scripts = script_host();
    scripts
        .exec(
            r#"
            n = 0
            local f = function() n = n + 1 end
            on("k", f)
            once("k", f)
            emit("k")
            removed = off("k", f)
            emit("k")
            "#,
            "on-once-off",
        )
        .unwrap();
    assert_eq!(global::<i64>(&scripts, "n"), 2);
    assert!(global::<bool>(&scripts, "removed"));
    assert_eq!(scripts.lua_handler_count(), 0);
}
