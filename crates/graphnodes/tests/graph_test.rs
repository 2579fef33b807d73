// crates/graphnodes/tests/graph_test.rs

use graphcore::lower::Evaluator;
use graphcore::{FlowError, Node, NodeError, PortId, SystemError, Value, Wiring};
use graphnodes::{Arithmetic, ConsolePrinter, Constant, Product, Sum, Truthiness};
use graphruntime::{FlowRuntime, For, If, System};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Lower `root`, execute the block and return the evaluator
fn evaluate(runtime: &FlowRuntime, wiring: &Wiring, root: &System) -> Evaluator {
    let block = runtime.lower(wiring, root).unwrap();
    let mut eval = Evaluator::new();
    eval.exec(&block).unwrap();
    eval
}

/// The lowered program must agree with interpretation on `port`
fn assert_equivalent(eval: &Evaluator, wiring: &Wiring, port: PortId) {
    let name = wiring.reference(port).unwrap();
    assert_eq!(eval.get(&name), Some(&wiring.value(port).unwrap()), "binding {name}");
}

#[test]
fn test_sum_of_floats() {
    init_tracing();
    let mut wiring = Wiring::new();
    let mut root = System::new("root");

    let sum = Sum::new(&mut wiring);
    let sum_out = sum.output();
    for value in [1.2, 4.75, 9.87] {
        let constant = Constant::new(&mut wiring, value);
        wiring.connect(constant.output(), sum.input()).unwrap();
        root.add(&mut wiring, constant).unwrap();
    }
    root.add(&mut wiring, sum).unwrap();

    let runtime = FlowRuntime::new();
    let result = runtime.execute(&mut wiring, &mut root).unwrap();
    assert!(result.validation.is_clean());

    let total = wiring.value(sum_out).unwrap().as_f64().unwrap();
    assert!((total - 15.82).abs() < 1e-9);
    assert_equivalent(&evaluate(&runtime, &wiring, &root), &wiring, sum_out);
}

#[test]
fn test_product_of_integers() {
    init_tracing();
    let mut wiring = Wiring::new();
    let mut root = System::new("root");

    let product = Product::new(&mut wiring);
    let (product_in, product_out) = (product.input(), product.output());
    root.add(&mut wiring, product).unwrap();
    for value in [2i64, 4, 9] {
        let constant = Constant::new(&mut wiring, value);
        let out = constant.output();
        root.add(&mut wiring, constant).unwrap();
        wiring.connect(out, product_in).unwrap();
    }

    let runtime = FlowRuntime::new();
    runtime.execute(&mut wiring, &mut root).unwrap();
    assert_eq!(wiring.value(product_out).unwrap(), Value::Int(72));
    assert_equivalent(&evaluate(&runtime, &wiring, &root), &wiring, product_out);
}

#[test]
fn test_for_doubles_every_element() {
    init_tracing();
    let mut wiring = Wiring::new();
    let mut root = System::new("root");

    let items = Constant::new(&mut wiring, vec![0.5, 1.0, 2.0, 3.0, 3.5]);
    let mut looped = For::new(&mut wiring).unwrap();
    wiring.connect(items.output(), looped.iterator()).unwrap();

    let doubled = looped.add_accumulator(&mut wiring, "doubled").unwrap();
    let two = Constant::new(&mut wiring, 2.0);
    let product = Product::new(&mut wiring);
    let (two_out, product_in, product_out) = (two.output(), product.input(), product.output());
    looped.body_mut().add(&mut wiring, two).unwrap();
    looped.body_mut().add(&mut wiring, product).unwrap();
    wiring.connect(looped.iteration(), product_in).unwrap();
    wiring.connect(two_out, product_in).unwrap();
    wiring.connect(product_out, doubled.input).unwrap();

    let mut printer = ConsolePrinter::new(&mut wiring);
    printer.set_name("Doubled".to_string());
    looped.bind_output(&mut wiring, "doubled", printer.input()).unwrap();

    root.add(&mut wiring, items).unwrap();
    root.add(&mut wiring, printer).unwrap();
    root.add(&mut wiring, looped).unwrap();

    let runtime = FlowRuntime::new();
    let result = runtime.execute(&mut wiring, &mut root).unwrap();
    assert!(!result.validation.has_errors());
    assert_eq!(
        wiring.value(doubled.output).unwrap(),
        Value::from(vec![1.0, 2.0, 4.0, 6.0, 7.0])
    );

    let eval = evaluate(&runtime, &wiring, &root);
    assert_equivalent(&eval, &wiring, doubled.output);
    assert_eq!(eval.output(), ["Doubled: [1.0, 2.0, 4.0, 6.0, 7.0]".to_string()]);
}

#[test]
fn test_for_reads_factor_from_enclosing_system() {
    init_tracing();
    let mut wiring = Wiring::new();
    let mut root = System::new("root");

    let mut looped = For::new(&mut wiring).unwrap();
    let iterator = looped.iterator();
    let factor = looped.add_input(&mut wiring, "factor").unwrap();
    let scaled = looped.add_accumulator(&mut wiring, "scaled").unwrap();
    let product = Product::new(&mut wiring);
    let (product_in, product_out) = (product.input(), product.output());
    looped.body_mut().add(&mut wiring, product).unwrap();
    wiring.connect(looped.iteration(), product_in).unwrap();
    wiring.connect(factor.output, product_in).unwrap();
    wiring.connect(product_out, scaled.input).unwrap();

    // The loop goes in first; its producers are added afterwards.
    let two = Constant::new(&mut wiring, 2.0);
    looped.bind_input(&mut wiring, "factor", two.output()).unwrap();
    let looped_id = root.add(&mut wiring, looped).unwrap();
    let items = Constant::new(&mut wiring, vec![0.5, 1.0, 2.0, 3.0, 3.5]);
    let items_out = items.output();
    root.add(&mut wiring, items).unwrap();
    root.add(&mut wiring, two).unwrap();
    wiring.connect(items_out, iterator).unwrap();
    assert_eq!(root.execution_order(&wiring).unwrap().last(), Some(&looped_id));

    let runtime = FlowRuntime::new();
    let result = runtime.execute(&mut wiring, &mut root).unwrap();
    assert!(!result.validation.has_errors());
    assert_eq!(
        wiring.value(scaled.output).unwrap(),
        Value::from(vec![1.0, 2.0, 4.0, 6.0, 7.0])
    );
    assert_equivalent(&evaluate(&runtime, &wiring, &root), &wiring, scaled.output);
}

/// A cycle nested in a loop body stops the whole graph before anything runs
#[test]
fn test_cycle_inside_loop_body_is_rejected() {
    init_tracing();
    let mut wiring = Wiring::new();
    let mut root = System::new("root");

    let bystander = Constant::new(&mut wiring, 1i64);
    let bystander_out = bystander.output();
    root.add(&mut wiring, bystander).unwrap();

    let items = Constant::new(&mut wiring, vec![1i64, 2]);
    let mut looped = For::new(&mut wiring).unwrap();
    wiring.connect(items.output(), looped.iterator()).unwrap();
    let a = Sum::new(&mut wiring);
    let b = Sum::new(&mut wiring);
    wiring.connect(a.output(), b.input()).unwrap();
    wiring.connect(b.output(), a.input()).unwrap();
    looped.body_mut().add(&mut wiring, a).unwrap();
    looped.body_mut().add(&mut wiring, b).unwrap();
    root.add(&mut wiring, items).unwrap();
    root.add(&mut wiring, looped).unwrap();

    let runtime = FlowRuntime::new();
    match runtime.execute(&mut wiring, &mut root) {
        Err(FlowError::System(SystemError::CyclicGraph { system, nodes })) => {
            assert_eq!(system, "for_body");
            assert_eq!(nodes, ["Sum", "Sum"]);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(matches!(
        wiring.value(bystander_out),
        Err(FlowError::Node(NodeError::ValueNotComputed { .. }))
    ));
    assert!(matches!(
        runtime.lower(&wiring, &root),
        Err(FlowError::System(SystemError::CyclicGraph { .. }))
    ));
}

/// For over 0..=9 with an If on `value % 2` splitting into two accumulators
fn even_odd(wiring: &mut Wiring) -> (System, PortId, PortId) {
    let mut root = System::new("root");
    let items = Constant::new(wiring, (0..10i64).collect::<Vec<_>>());
    let mut looped = For::new(wiring).unwrap();
    wiring.connect(items.output(), looped.iterator()).unwrap();
    let even = looped.add_accumulator(wiring, "even").unwrap();
    let odd = looped.add_accumulator(wiring, "odd").unwrap();

    let two = Constant::new(wiring, 2i64);
    let modulo = Arithmetic::modulo(wiring);
    let (two_out, lhs, rhs, parity) = (two.output(), modulo.lhs(), modulo.rhs(), modulo.output());

    let mut branch = If::new(wiring);
    let value = branch.add_input(wiring, "value").unwrap();
    let odd_slot = branch.add_output(wiring, "odd").unwrap();
    let even_slot = branch.add_output(wiring, "even").unwrap();
    wiring.connect(value.on_true.output, odd_slot.on_true.input).unwrap();
    wiring.connect(value.on_false.output, even_slot.on_false.input).unwrap();
    branch.bind_input(wiring, "value", looped.iteration()).unwrap();
    let condition = branch.condition();

    let body = looped.body_mut();
    body.add(wiring, two).unwrap();
    body.add(wiring, modulo).unwrap();
    body.add(wiring, branch).unwrap();
    wiring.connect(looped.iteration(), lhs).unwrap();
    wiring.connect(two_out, rhs).unwrap();
    wiring.connect(parity, condition).unwrap();
    wiring.connect(odd_slot.output, odd.input).unwrap();
    wiring.connect(even_slot.output, even.input).unwrap();

    root.add(wiring, items).unwrap();
    root.add(wiring, looped).unwrap();
    (root, even.output, odd.output)
}

#[test]
fn test_for_with_branch_splits_even_and_odd() {
    init_tracing();
    let mut wiring = Wiring::new();
    let (mut root, even, odd) = even_odd(&mut wiring);

    let runtime = FlowRuntime::new();
    runtime.execute(&mut wiring, &mut root).unwrap();
    assert_eq!(wiring.value(even).unwrap(), Value::from(vec![0i64, 2, 4, 6, 8]));
    assert_eq!(wiring.value(odd).unwrap(), Value::from(vec![1i64, 3, 5, 7, 9]));

    let eval = evaluate(&runtime, &wiring, &root);
    assert_equivalent(&eval, &wiring, even);
    assert_equivalent(&eval, &wiring, odd);
}

#[test]
fn test_repeated_runs_and_lowering_are_identical() {
    init_tracing();
    let mut wiring = Wiring::new();
    let (mut root, even, _) = even_odd(&mut wiring);
    let runtime = FlowRuntime::new();

    runtime.execute(&mut wiring, &mut root).unwrap();
    let first = wiring.value(even).unwrap();
    let first_json = runtime.lower_json(&wiring, &root).unwrap();
    runtime.execute(&mut wiring, &mut root).unwrap();
    assert_eq!(wiring.value(even).unwrap(), first);
    assert_eq!(runtime.lower_json(&wiring, &root).unwrap(), first_json);
}

#[test]
fn test_feedback_loop_is_rejected() {
    init_tracing();
    let mut wiring = Wiring::new();
    let mut root = System::new("root");
    let a = Sum::new(&mut wiring);
    let b = Sum::new(&mut wiring);
    wiring.connect(a.output(), b.input()).unwrap();
    wiring.connect(b.output(), a.input()).unwrap();
    let any = Truthiness::any(&mut wiring);
    root.add(&mut wiring, any).unwrap();
    root.add(&mut wiring, a).unwrap();
    root.add(&mut wiring, b).unwrap();

    let runtime = FlowRuntime::new();
    assert!(matches!(
        runtime.execute(&mut wiring, &mut root),
        Err(FlowError::System(SystemError::CyclicGraph { .. }))
    ));
    assert!(matches!(
        runtime.lower(&wiring, &root),
        Err(FlowError::System(SystemError::CyclicGraph { .. }))
    ));
}
